use std::str::FromStr;

use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::book::{BookChanges, BookStatus, Category, Condition, NewBook},
    repositories::book::{BookFilter, BookQuery, BookSort},
    validation::auth::non_blank,
};

/// The longest accepted title.
const MAX_TITLE_LEN: usize = 100;
/// The page size used when the client does not ask for one.
pub const DEFAULT_PAGE_SIZE: u64 = 25;
/// The largest page size a client may ask for.
pub const MAX_PAGE_SIZE: u64 = 100;

/// A listing as submitted by a client. Unknown fields, including any
/// `seller`, are dropped during deserialization.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct BookDraft {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub condition: Option<String>,
    pub category: Option<String>,
}

/// Changes to a listing as submitted by a client.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub condition: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
}

/// Listing query parameters.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct ListBooksQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub sort: Option<String>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub status: Option<String>,
    pub seller: Option<Uuid>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

fn required<T>(field: &str, value: Option<T>, message: &str) -> Result<T> {
    value.ok_or_else(|| AppError::validation(field, message))
}

fn parse_member<T: FromStr>(field: &str, value: &str, message: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::validation(field, message))
}

fn title(value: &str) -> Result<String> {
    let title = non_blank("title", value)?;
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::validation(
            "title",
            format!("Book title cannot exceed {} characters", MAX_TITLE_LEN),
        ));
    }
    Ok(title)
}

fn price(field: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::validation(field, "Price must be a non-negative number"));
    }
    Ok(value)
}

fn condition(value: &str) -> Result<Condition> {
    parse_member("condition", value, "Please select correct condition for book")
}

fn category(value: &str) -> Result<Category> {
    parse_member("category", value, "Please select correct category for book")
}

fn status(value: &str) -> Result<BookStatus> {
    parse_member("status", value, "Status must be one of available, pending, traded")
}

/// Validates a draft into a listing. Fails on the first missing or invalid
/// field, in declaration order.
///
/// # Arguments
///
/// * `draft` - The submitted listing.
///
/// # Returns
///
/// A `Result` containing the validated `NewBook`.
pub fn new_book(draft: BookDraft) -> Result<NewBook> {
    let title = title(&required("title", draft.title, "Please enter book title")?)?;
    let author = non_blank(
        "author",
        &required("author", draft.author, "Please enter author name")?,
    )?;
    let description = non_blank(
        "description",
        &required("description", draft.description, "Please enter book description")?,
    )?;
    let price = price("price", required("price", draft.price, "Please enter price")?)?;
    let condition = condition(&required(
        "condition",
        draft.condition,
        "Please select condition for this book",
    )?)?;
    let category = category(&required(
        "category",
        draft.category,
        "Please select category for this book",
    )?)?;

    Ok(NewBook {
        title,
        author,
        description,
        price,
        condition,
        category,
    })
}

/// Validates the fields present in a patch. Absent fields stay untouched.
pub fn book_changes(patch: BookPatch) -> Result<BookChanges> {
    Ok(BookChanges {
        title: patch.title.as_deref().map(title).transpose()?,
        author: patch
            .author
            .as_deref()
            .map(|v| non_blank("author", v))
            .transpose()?,
        description: patch
            .description
            .as_deref()
            .map(|v| non_blank("description", v))
            .transpose()?,
        price: patch.price.map(|v| price("price", v)).transpose()?,
        condition: patch.condition.as_deref().map(condition).transpose()?,
        category: patch.category.as_deref().map(category).transpose()?,
        status: patch.status.as_deref().map(status).transpose()?,
    })
}

/// Validates listing parameters into a repository query.
pub fn book_query(params: ListBooksQuery) -> Result<BookQuery> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

    let sort = match params.sort.as_deref() {
        None | Some("") => BookSort::default(),
        Some(value) => BookSort::parse(value)
            .ok_or_else(|| AppError::validation("sort", format!("Unknown sort key '{}'", value)))?,
    };

    let filter = BookFilter {
        category: params.category.as_deref().map(category).transpose()?,
        condition: params.condition.as_deref().map(condition).transpose()?,
        status: params.status.as_deref().map(status).transpose()?,
        seller: params.seller,
        min_price: params.min_price.map(|v| price("minPrice", v)).transpose()?,
        max_price: params.max_price.map(|v| price("maxPrice", v)).transpose()?,
    };

    Ok(BookQuery {
        filter,
        sort,
        offset: (page - 1).saturating_mul(limit),
        limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> BookDraft {
        BookDraft {
            title: Some("  Operating Systems ".into()),
            author: Some("Tanenbaum".into()),
            description: Some("Third edition".into()),
            price: Some(15.0),
            condition: Some("Like New".into()),
            category: Some("Textbooks".into()),
        }
    }

    fn field_of(err: AppError) -> String {
        match err {
            AppError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn complete_drafts_validate_and_trim() {
        let book = new_book(draft()).unwrap();
        assert_eq!(book.title, "Operating Systems");
        assert_eq!(book.condition, Condition::LikeNew);
        assert_eq!(book.category, Category::Textbooks);
    }

    #[test]
    fn missing_fields_are_named() {
        let mut d = draft();
        d.author = None;
        assert_eq!(field_of(new_book(d).unwrap_err()), "author");

        let mut d = draft();
        d.price = None;
        assert_eq!(field_of(new_book(d).unwrap_err()), "price");
    }

    #[test]
    fn enum_values_outside_the_set_are_rejected() {
        let mut d = draft();
        d.condition = Some("Mint".into());
        assert_eq!(field_of(new_book(d).unwrap_err()), "condition");

        let mut d = draft();
        d.category = Some("Comics".into());
        assert_eq!(field_of(new_book(d).unwrap_err()), "category");
    }

    #[test]
    fn negative_prices_and_long_titles_are_rejected() {
        let mut d = draft();
        d.price = Some(-1.0);
        assert_eq!(field_of(new_book(d).unwrap_err()), "price");

        let mut d = draft();
        d.title = Some("x".repeat(101));
        assert_eq!(field_of(new_book(d).unwrap_err()), "title");
    }

    #[test]
    fn patch_rejects_unknown_status() {
        let patch = BookPatch {
            status: Some("sold".into()),
            ..Default::default()
        };
        assert_eq!(field_of(book_changes(patch).unwrap_err()), "status");
    }

    #[test]
    fn patch_keeps_only_present_fields() {
        let patch = BookPatch {
            price: Some(5.0),
            status: Some("pending".into()),
            ..Default::default()
        };
        let changes = book_changes(patch).unwrap();
        assert_eq!(changes.price, Some(5.0));
        assert_eq!(changes.status, Some(BookStatus::Pending));
        assert_eq!(changes.title, None);
    }

    #[test]
    fn query_defaults_and_clamps() {
        let query = book_query(ListBooksQuery::default()).unwrap();
        assert_eq!(query.offset, 0);
        assert_eq!(query.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(query.sort, BookSort::Newest);

        let query = book_query(ListBooksQuery {
            page: Some(3),
            limit: Some(1_000),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(query.limit, MAX_PAGE_SIZE);
        assert_eq!(query.offset, 2 * MAX_PAGE_SIZE);
    }

    #[test]
    fn query_rejects_unknown_sort_and_filters() {
        let err = book_query(ListBooksQuery {
            sort: Some("popularity".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(field_of(err), "sort");

        let err = book_query(ListBooksQuery {
            status: Some("sold".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(field_of(err), "status");
    }
}
