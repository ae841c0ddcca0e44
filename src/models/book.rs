use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use uuid::Uuid;

use crate::models::user::SellerSummary;

/// Returned when a string is not a member of a closed value set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub value: String,
}

/// Implements the string forms of a closed enum used at the API boundary.
macro_rules! closed_set {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Every member of the set, in declaration order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    other => Err(UnknownVariant { value: other.to_string() }),
                }
            }
        }
    };
}

/// The physical condition of a listed book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSql, FromSql)]
#[postgres(name = "book_condition")]
pub enum Condition {
    #[postgres(name = "New")]
    New,
    #[serde(rename = "Like New")]
    #[postgres(name = "Like New")]
    LikeNew,
    #[postgres(name = "Good")]
    Good,
    #[postgres(name = "Fair")]
    Fair,
    #[postgres(name = "Poor")]
    Poor,
}

closed_set!(Condition {
    New => "New",
    LikeNew => "Like New",
    Good => "Good",
    Fair => "Fair",
    Poor => "Poor",
});

/// The catalogue section a book is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSql, FromSql)]
#[postgres(name = "book_category")]
pub enum Category {
    #[postgres(name = "Textbooks")]
    Textbooks,
    #[postgres(name = "Novels")]
    Novels,
    #[postgres(name = "Academic")]
    Academic,
    #[postgres(name = "Reference")]
    Reference,
    #[serde(rename = "Non-Fiction")]
    #[postgres(name = "Non-Fiction")]
    NonFiction,
    #[postgres(name = "Others")]
    Others,
}

closed_set!(Category {
    Textbooks => "Textbooks",
    Novels => "Novels",
    Academic => "Academic",
    Reference => "Reference",
    NonFiction => "Non-Fiction",
    Others => "Others",
});

/// Where a listing is in its trade lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSql, FromSql)]
#[serde(rename_all = "lowercase")]
#[postgres(name = "book_status")]
pub enum BookStatus {
    #[default]
    #[postgres(name = "available")]
    Available,
    #[postgres(name = "pending")]
    Pending,
    #[postgres(name = "traded")]
    Traded,
}

closed_set!(BookStatus {
    Available => "available",
    Pending => "pending",
    Traded => "traded",
});

/// A stored photo of a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookImage {
    /// The name the photo is stored under.
    pub storage_id: String,
    /// The public URL of the photo.
    pub url: String,
}

/// A listed book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub description: String,
    pub price: f64,
    pub condition: Condition,
    pub category: Category,
    /// The identity that created the listing. Set once, never patched.
    pub seller: Uuid,
    pub status: BookStatus,
    pub images: Vec<BookImage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Row> for Book {
    fn from(row: &Row) -> Self {
        let image_ids: Vec<String> = row.get("image_ids");
        let image_urls: Vec<String> = row.get("image_urls");

        Self {
            id: row.get("id"),
            title: row.get("title"),
            author: row.get("author"),
            description: row.get("description"),
            price: row.get("price"),
            condition: row.get("condition"),
            category: row.get("category"),
            seller: row.get("seller_id"),
            status: row.get("status"),
            images: image_ids
                .into_iter()
                .zip(image_urls)
                .map(|(storage_id, url)| BookImage { storage_id, url })
                .collect(),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

/// A validated listing ready to be persisted. Carries no seller: the seller is
/// always the authenticated caller.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub description: String,
    pub price: f64,
    pub condition: Condition,
    pub category: Category,
}

/// A validated set of changes to an existing listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookChanges {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub condition: Option<Condition>,
    pub category: Option<Category>,
    pub status: Option<BookStatus>,
}

impl BookChanges {
    pub fn is_empty(&self) -> bool {
        *self == BookChanges::default()
    }

    /// Applies the changes onto `book`, leaving untouched fields as they are.
    pub fn apply(self, book: &mut Book) {
        if let Some(title) = self.title {
            book.title = title;
        }
        if let Some(author) = self.author {
            book.author = author;
        }
        if let Some(description) = self.description {
            book.description = description;
        }
        if let Some(price) = self.price {
            book.price = price;
        }
        if let Some(condition) = self.condition {
            book.condition = condition;
        }
        if let Some(category) = self.category {
            book.category = category;
        }
        if let Some(status) = self.status {
            book.status = status;
        }
    }
}

/// A book with its seller populated, as returned by read operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookView {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub description: String,
    pub price: f64,
    pub condition: Condition,
    pub category: Category,
    /// `None` when the seller account no longer exists.
    pub seller: Option<SellerSummary>,
    pub status: BookStatus,
    pub images: Vec<BookImage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookView {
    pub fn new(book: Book, seller: Option<SellerSummary>) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            description: book.description,
            price: book.price,
            condition: book.condition,
            category: book.category,
            seller,
            status: book.status,
            images: book.images,
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_sets_parse_their_display_names() {
        for condition in Condition::ALL {
            assert_eq!(condition.as_str().parse::<Condition>(), Ok(*condition));
        }
        assert_eq!("Non-Fiction".parse::<Category>(), Ok(Category::NonFiction));
        assert_eq!("traded".parse::<BookStatus>(), Ok(BookStatus::Traded));
    }

    #[test]
    fn values_outside_the_set_are_rejected() {
        assert!("sold".parse::<BookStatus>().is_err());
        assert!("Available".parse::<BookStatus>().is_err());
        assert!("like new".parse::<Condition>().is_err());
        assert_eq!(
            "Comics".parse::<Category>(),
            Err(UnknownVariant { value: "Comics".into() })
        );
    }

    #[test]
    fn serde_names_match_the_string_forms() {
        let json = sonic_rs::to_string(&Condition::LikeNew).unwrap();
        assert_eq!(json, r#""Like New""#);
        let json = sonic_rs::to_string(&BookStatus::Pending).unwrap();
        assert_eq!(json, r#""pending""#);
    }

    #[test]
    fn empty_changes_leave_the_book_untouched() {
        let changes = BookChanges::default();
        assert!(changes.is_empty());
        let changes = BookChanges {
            status: Some(BookStatus::Pending),
            ..Default::default()
        };
        assert!(!changes.is_empty());
    }
}
