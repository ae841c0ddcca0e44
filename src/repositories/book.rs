use async_trait::async_trait;
use deadpool_postgres::Pool;
use postgres_types::ToSql;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::book::{Book, BookStatus, Category, Condition, NewBook},
    services::search,
};

/// Orderings accepted by the listing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookSort {
    #[default]
    Newest,
    Oldest,
    PriceAsc,
    PriceDesc,
    TitleAsc,
    TitleDesc,
}

impl BookSort {
    /// Parses the `sort` query parameter (`price`, `-price`, `createdAt`, ...).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "-createdAt" => Some(BookSort::Newest),
            "createdAt" => Some(BookSort::Oldest),
            "price" => Some(BookSort::PriceAsc),
            "-price" => Some(BookSort::PriceDesc),
            "title" => Some(BookSort::TitleAsc),
            "-title" => Some(BookSort::TitleDesc),
            _ => None,
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            BookSort::Newest => "created_at DESC, id",
            BookSort::Oldest => "created_at ASC, id",
            BookSort::PriceAsc => "price ASC, created_at DESC",
            BookSort::PriceDesc => "price DESC, created_at DESC",
            BookSort::TitleAsc => "title ASC, created_at DESC",
            BookSort::TitleDesc => "title DESC, created_at DESC",
        }
    }
}

/// Field filters for listings. `None` means unconstrained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookFilter {
    pub category: Option<Category>,
    pub condition: Option<Condition>,
    pub status: Option<BookStatus>,
    pub seller: Option<Uuid>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl BookFilter {
    pub fn matches(&self, book: &Book) -> bool {
        self.category.is_none_or(|c| book.category == c)
            && self.condition.is_none_or(|c| book.condition == c)
            && self.status.is_none_or(|s| book.status == s)
            && self.seller.is_none_or(|s| book.seller == s)
            && self.min_price.is_none_or(|p| book.price >= p)
            && self.max_price.is_none_or(|p| book.price <= p)
    }
}

/// A validated listing query.
#[derive(Debug, Clone, PartialEq)]
pub struct BookQuery {
    pub filter: BookFilter,
    pub sort: BookSort,
    pub offset: u64,
    pub limit: u64,
}

/// Storage for book listings. Each mutation is a single-row
/// read-modify-write; concurrent writers resolve as last-write-wins.
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Inserts a listing owned by `seller` with status `available`.
    async fn create(&self, seller: Uuid, book: NewBook) -> Result<Book>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Book>>;

    /// Returns one page of matching books and the total number of matches.
    async fn list(&self, query: &BookQuery) -> Result<(Vec<Book>, u64)>;

    /// Persists the mutable fields of `book` and bumps `updated_at`.
    async fn save(&self, book: &Book) -> Result<Book>;

    /// Removes the listing. Returns `false` when nothing was deleted.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Relevance-ranked free-text match, best first.
    async fn search(&self, query: &str) -> Result<Vec<Book>>;
}

/// PostgreSQL-backed book storage.
#[derive(Clone)]
pub struct PgBookRepository {
    pool: Pool,
}

impl PgBookRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

pub fn book_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Book not found with id of {}", id))
}

#[async_trait]
impl BookRepository for PgBookRepository {
    async fn create(&self, seller: Uuid, book: NewBook) -> Result<Book> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                r#"
                INSERT INTO books (id, title, author, description, price, condition, category, seller_id, status)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'available')
                RETURNING *
                "#,
                &[
                    &Uuid::new_v4(),
                    &book.title,
                    &book.author,
                    &book.description,
                    &book.price,
                    &book.condition,
                    &book.category,
                    &seller,
                ],
            )
            .await?;
        Ok(Book::from(&row))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Book>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt("SELECT * FROM books WHERE id = $1", &[&id])
            .await?;
        Ok(row.as_ref().map(Book::from))
    }

    async fn list(&self, query: &BookQuery) -> Result<(Vec<Book>, u64)> {
        let filter = &query.filter;
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn ToSql + Sync + Send>> = Vec::new();

        if let Some(category) = filter.category {
            params.push(Box::new(category));
            clauses.push(format!("category = ${}", params.len()));
        }
        if let Some(condition) = filter.condition {
            params.push(Box::new(condition));
            clauses.push(format!("condition = ${}", params.len()));
        }
        if let Some(status) = filter.status {
            params.push(Box::new(status));
            clauses.push(format!("status = ${}", params.len()));
        }
        if let Some(seller) = filter.seller {
            params.push(Box::new(seller));
            clauses.push(format!("seller_id = ${}", params.len()));
        }
        if let Some(min_price) = filter.min_price {
            params.push(Box::new(min_price));
            clauses.push(format!("price >= ${}", params.len()));
        }
        if let Some(max_price) = filter.max_price {
            params.push(Box::new(max_price));
            clauses.push(format!("price <= ${}", params.len()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        let count_sql = format!("SELECT COUNT(*) FROM books {}", where_sql);
        let page_sql = format!(
            "SELECT * FROM books {} ORDER BY {} LIMIT {} OFFSET {}",
            where_sql,
            query.sort.sql(),
            query.limit,
            query.offset
        );

        let client = self.pool.get().await?;
        let total: i64 = client.query_one(count_sql.as_str(), &refs).await?.get(0);
        let rows = client.query(page_sql.as_str(), &refs).await?;

        Ok((rows.iter().map(Book::from).collect(), total.max(0) as u64))
    }

    async fn save(&self, book: &Book) -> Result<Book> {
        let image_ids: Vec<&str> = book.images.iter().map(|i| i.storage_id.as_str()).collect();
        let image_urls: Vec<&str> = book.images.iter().map(|i| i.url.as_str()).collect();

        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                UPDATE books
                SET
                    title = $2,
                    author = $3,
                    description = $4,
                    price = $5,
                    condition = $6,
                    category = $7,
                    status = $8,
                    image_ids = $9,
                    image_urls = $10,
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
                &[
                    &book.id,
                    &book.title,
                    &book.author,
                    &book.description,
                    &book.price,
                    &book.condition,
                    &book.category,
                    &book.status,
                    &image_ids,
                    &image_urls,
                ],
            )
            .await?
            .ok_or_else(|| book_not_found(book.id))?;
        Ok(Book::from(&row))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM books WHERE id = $1", &[&id])
            .await?;
        Ok(deleted > 0)
    }

    async fn search(&self, query: &str) -> Result<Vec<Book>> {
        // Terms are alphanumeric tokens, so joining them is safe for to_tsquery.
        // The 'simple' config neither stems nor drops stop words, which keeps
        // matches the same as the in-memory ranking.
        let terms = search::tokenize(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let tsquery = terms.join(" | ");

        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT *, ts_rank(search_vector, to_tsquery('simple', $1)) AS score
                FROM books
                WHERE search_vector @@ to_tsquery('simple', $1)
                ORDER BY score DESC, created_at ASC
                "#,
                &[&tsquery],
            )
            .await?;
        Ok(rows.iter().map(Book::from).collect())
    }
}
