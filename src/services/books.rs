use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{
        book::{Book, BookImage, BookView},
        user::SellerSummary,
    },
    repositories::book::{book_not_found, BookQuery},
    services::{
        authz::{self, Caller},
        photos::{self, UploadedFile},
        search,
    },
    state::AppState,
    validation::book::{self as book_validation, BookDraft, BookPatch, ListBooksQuery},
};

/// One page of a listing.
#[derive(Debug, Clone)]
pub struct BookPage {
    pub items: Vec<BookView>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

impl BookPage {
    pub fn next_page(&self) -> Option<u64> {
        (self.page * self.limit < self.total).then_some(self.page + 1)
    }

    pub fn prev_page(&self) -> Option<u64> {
        (self.page > 1).then(|| self.page - 1)
    }
}

/// Loads a book or fails with `NotFound`.
async fn load(state: &AppState, id: Uuid) -> Result<Book> {
    state.books.find_by_id(id).await?.ok_or_else(|| book_not_found(id))
}

/// Looks up the seller projection for `seller_id`.
async fn seller_summary(
    state: &AppState,
    seller_id: Uuid,
    with_email: bool,
) -> Result<Option<SellerSummary>> {
    Ok(state
        .users
        .find_by_id(seller_id)
        .await?
        .map(|user| user.seller_summary(with_email)))
}

/// Creates a listing owned by the caller.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `caller` - The authenticated caller, if any.
/// * `draft` - The submitted listing. Any seller it names is ignored.
///
/// # Returns
///
/// A `Result` containing the created `Book`.
pub async fn create(state: &AppState, caller: Option<&Caller>, draft: BookDraft) -> Result<Book> {
    let caller = caller.ok_or(AppError::Unauthenticated)?;
    let new_book = book_validation::new_book(draft)?;

    let book = state.books.create(caller.id, new_book).await?;
    tracing::info!("📚 Book {} listed by {}", book.id, caller.id);
    Ok(book)
}

/// Gets a single listing with its seller's name, email, university and
/// department.
pub async fn get(state: &AppState, id: Uuid) -> Result<BookView> {
    let book = load(state, id).await?;
    let seller = seller_summary(state, book.seller, true).await?;
    Ok(BookView::new(book, seller))
}

/// Lists listings page by page. Seller emails are not exposed here.
pub async fn list(state: &AppState, params: ListBooksQuery) -> Result<BookPage> {
    let query: BookQuery = book_validation::book_query(params)?;
    let (books, total) = state.books.list(&query).await?;

    let mut sellers: HashMap<Uuid, Option<SellerSummary>> = HashMap::new();
    let mut items = Vec::with_capacity(books.len());
    for book in books {
        if !sellers.contains_key(&book.seller) {
            let summary = seller_summary(state, book.seller, false).await?;
            sellers.insert(book.seller, summary);
        }
        let seller = sellers.get(&book.seller).cloned().flatten();
        items.push(BookView::new(book, seller));
    }

    Ok(BookPage {
        items,
        total,
        page: query.offset / query.limit + 1,
        limit: query.limit,
    })
}

/// Loads a listing and checks that `caller` may perform `action` on it.
///
/// Handlers call this before they read the request body, so a missing book
/// or a refused caller is reported ahead of any problem with the payload.
pub async fn load_for_change(
    state: &AppState,
    caller: Option<&Caller>,
    id: Uuid,
    action: &str,
) -> Result<Book> {
    let book = load(state, id).await?;
    authz::authorize(caller, &book, action)?;
    Ok(book)
}

/// Applies a patch to a listing on behalf of its seller or an admin.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `caller` - The authenticated caller, if any.
/// * `id` - The ID of the book.
/// * `patch` - The submitted changes.
///
/// # Returns
///
/// A `Result` containing the updated `Book`.
pub async fn update(
    state: &AppState,
    caller: Option<&Caller>,
    id: Uuid,
    patch: BookPatch,
) -> Result<Book> {
    let book = load_for_change(state, caller, id, "update").await?;
    apply_patch(state, book, patch).await
}

/// Validates `patch` and writes it to an already authorized `book`.
pub async fn apply_patch(state: &AppState, mut book: Book, patch: BookPatch) -> Result<Book> {
    let changes = book_validation::book_changes(patch)?;
    if changes.is_empty() {
        return Ok(book);
    }
    changes.apply(&mut book);

    let book = state.books.save(&book).await?;
    tracing::info!("✅ Book {} updated", book.id);
    Ok(book)
}

/// Removes a listing on behalf of its seller or an admin.
pub async fn delete(state: &AppState, caller: Option<&Caller>, id: Uuid) -> Result<()> {
    let book = load_for_change(state, caller, id, "delete").await?;

    if !state.books.delete(id).await? {
        return Err(book_not_found(id));
    }
    for image in &book.images {
        state.photos.remove(&image.storage_id).await;
    }

    tracing::info!("🗑️ Book {} deleted", id);
    Ok(())
}

/// Replaces a listing's photo on behalf of its seller or an admin. A rejected
/// upload leaves the current photo untouched.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `caller` - The authenticated caller, if any.
/// * `id` - The ID of the book.
/// * `file` - The uploaded file, if the request carried one.
///
/// # Returns
///
/// A `Result` containing the stored `BookImage`.
pub async fn replace_photo(
    state: &AppState,
    caller: Option<&Caller>,
    id: Uuid,
    file: Option<UploadedFile>,
) -> Result<BookImage> {
    let book = load_for_change(state, caller, id, "update").await?;
    store_photo(state, book, file).await
}

/// Validates `file` and makes it the only photo of an already authorized
/// `book`.
pub async fn store_photo(
    state: &AppState,
    mut book: Book,
    file: Option<UploadedFile>,
) -> Result<BookImage> {
    let file = file.ok_or_else(|| AppError::BadRequest("Please upload a file".to_string()))?;
    let extension = photos::validate_upload(&file, state.config.max_file_upload)?;

    let name = photos::photo_name(book.id, &extension);
    let image = state.photos.store(&name, &file.bytes).await?;

    let previous = std::mem::replace(&mut book.images, vec![image.clone()]);
    state.books.save(&book).await?;

    for old in previous.iter().filter(|old| old.storage_id != name) {
        state.photos.remove(&old.storage_id).await;
    }

    tracing::info!("🖼️ Photo for book {} replaced", book.id);
    Ok(image)
}

/// Relevance-ranked free-text search across title, author, description and
/// category.
pub async fn search(state: &AppState, query: &str) -> Result<Vec<Book>> {
    let query = search::validate_query(query)?;
    state.books.search(query).await
}
