//! Free-text relevance ranking over book listings.

use crate::error::{AppError, Result};
use crate::models::book::Book;

/// Relative weight of a match in each indexed field.
const TITLE_WEIGHT: f64 = 4.0;
const AUTHOR_WEIGHT: f64 = 2.0;
const CATEGORY_WEIGHT: f64 = 2.0;
const DESCRIPTION_WEIGHT: f64 = 1.0;

/// Rejects queries with no searchable content.
pub fn validate_query(query: &str) -> Result<&str> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::BadRequest("Please provide a search query".to_string()));
    }
    Ok(query)
}

/// Splits text into lower-cased alphanumeric terms.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Scores one field: occurrences of the query terms, damped by field length so
/// a hit in a short field outweighs the same hit buried in a long one.
fn field_score(field: &str, terms: &[String]) -> f64 {
    let tokens = tokenize(field);
    if tokens.is_empty() {
        return 0.0;
    }
    let hits = tokens
        .iter()
        .filter(|token| terms.iter().any(|term| term == *token))
        .count();
    hits as f64 / (tokens.len() as f64).sqrt()
}

/// The relevance of `book` for the given terms. Zero means no match.
pub fn score(book: &Book, terms: &[String]) -> f64 {
    TITLE_WEIGHT * field_score(&book.title, terms)
        + AUTHOR_WEIGHT * field_score(&book.author, terms)
        + CATEGORY_WEIGHT * field_score(book.category.as_str(), terms)
        + DESCRIPTION_WEIGHT * field_score(&book.description, terms)
}

/// Returns matching books with their scores, best first. Equal scores keep the
/// order in which `books` yielded them.
pub fn rank<'a, I>(books: I, query: &str) -> Vec<(&'a Book, f64)>
where
    I: IntoIterator<Item = &'a Book>,
{
    let terms = tokenize(query);
    if terms.is_empty() {
        return Vec::new();
    }

    let mut ranked: Vec<(&Book, f64)> = books
        .into_iter()
        .map(|book| (book, score(book, &terms)))
        .filter(|(_, score)| *score > 0.0)
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::book::{BookStatus, Category, Condition};
    use chrono::Utc;
    use uuid::Uuid;

    fn book(title: &str, author: &str, description: &str, category: Category) -> Book {
        Book {
            id: Uuid::new_v4(),
            title: title.to_string(),
            author: author.to_string(),
            description: description.to_string(),
            price: 0.0,
            condition: Condition::Good,
            category,
            seller: Uuid::new_v4(),
            status: BookStatus::Available,
            images: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn blank_queries_are_rejected() {
        assert!(matches!(validate_query(""), Err(AppError::BadRequest(_))));
        assert!(matches!(validate_query("   \t"), Err(AppError::BadRequest(_))));
        assert_eq!(validate_query("  rust ").unwrap(), "rust");
    }

    #[test]
    fn tokenize_lowercases_and_splits_on_punctuation() {
        assert_eq!(tokenize("Non-Fiction, 2nd ed."), vec!["non", "fiction", "2nd", "ed"]);
    }

    #[test]
    fn title_hits_outrank_description_hits() {
        let in_description = book(
            "Linear Algebra",
            "Strang",
            "Covers calculus prerequisites",
            Category::Textbooks,
        );
        let in_title = book("Calculus", "Stewart", "Early transcendentals", Category::Textbooks);
        let books = [in_description, in_title];

        let ranked = rank(books.iter(), "calculus");
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0.title, "Calculus");
    }

    #[test]
    fn category_is_searchable() {
        let books = [book("Dune", "Herbert", "Spice", Category::Novels)];
        assert_eq!(rank(books.iter(), "novels").len(), 1);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let first = book("Physics", "A", "x", Category::Academic);
        let second = book("Physics", "B", "x", Category::Academic);
        let books = [first.clone(), second.clone()];

        let ranked = rank(books.iter(), "physics");
        assert_eq!(ranked[0].0.id, first.id);
        assert_eq!(ranked[1].0.id, second.id);
    }

    #[test]
    fn no_match_is_empty() {
        let books = [book("Dune", "Herbert", "Spice", Category::Novels)];
        assert!(rank(books.iter(), "nonexistent-term-xyz").is_empty());
    }
}
