use axum::{
    body::Bytes,
    extract::{
        multipart::MultipartError, FromRequest, Multipart, Path, Query, Request, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{
        auth::DataResponse,
        book::{Book, BookView},
    },
    services::{
        authz::Caller,
        books as book_service,
        photos::UploadedFile,
    },
    state::AppState,
    validation::book::{BookDraft, BookPatch, ListBooksQuery},
};

/// The multipart field carrying the photo.
const PHOTO_FIELD: &str = "file";

#[derive(Deserialize, Debug, Default)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRef {
    pub page: u64,
    pub limit: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Pagination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<PageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<PageRef>,
}

/// The response payload for a listing page.
#[derive(Serialize, Deserialize, Debug)]
pub struct BookListResponse {
    pub success: bool,
    pub count: usize,
    pub total: u64,
    pub pagination: Pagination,
    pub data: Vec<BookView>,
}

/// The response payload for search results.
#[derive(Serialize, Deserialize, Debug)]
pub struct SearchResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<Book>,
}

/// Lists books with filters, sorting and pagination.
#[axum::debug_handler]
pub async fn list_books(
    State(state): State<AppState>,
    Query(params): Query<ListBooksQuery>,
) -> Result<Response> {
    let page = book_service::list(&state, params).await?;

    let pagination = Pagination {
        next: page.next_page().map(|p| PageRef {
            page: p,
            limit: page.limit,
        }),
        prev: page.prev_page().map(|p| PageRef {
            page: p,
            limit: page.limit,
        }),
    };

    let response = BookListResponse {
        success: true,
        count: page.items.len(),
        total: page.total,
        pagination,
        data: page.items,
    };

    Ok(Json(response).into_response())
}

/// Handles free-text search.
#[axum::debug_handler]
pub async fn search_books(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Response> {
    tracing::debug!("🔎 Searching books for '{}'", params.q);
    let books = book_service::search(&state, &params.q).await?;

    let response = SearchResponse {
        success: true,
        count: books.len(),
        data: books,
    };

    Ok(Json(response).into_response())
}

#[axum::debug_handler]
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let book = book_service::get(&state, id).await?;
    Ok(Json(DataResponse::new(book)).into_response())
}

/// Reads a JSON body into `T`. Mutating handlers call this only once the
/// target book has been loaded and the caller authorized.
async fn read_json<T: DeserializeOwned>(request: Request, state: &AppState) -> Result<T> {
    let bytes = Bytes::from_request(request, state)
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?;

    sonic_rs::from_slice(&bytes).map_err(|e| {
        tracing::debug!("Rejected request body: {}", e);
        AppError::BadRequest(format!("Invalid request body: {}", e))
    })
}

#[axum::debug_handler]
pub async fn create_book(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    request: Request,
) -> Result<Response> {
    let draft: BookDraft = read_json(request, &state).await?;
    let book = book_service::create(&state, Some(&caller), draft).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(book))).into_response())
}

#[axum::debug_handler]
pub async fn update_book(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    request: Request,
) -> Result<Response> {
    let book = book_service::load_for_change(&state, Some(&caller), id, "update").await?;
    let patch: BookPatch = read_json(request, &state).await?;
    let book = book_service::apply_patch(&state, book, patch).await?;
    Ok(Json(DataResponse::new(book)).into_response())
}

#[axum::debug_handler]
pub async fn delete_book(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    book_service::delete(&state, Some(&caller), id).await?;
    Ok(Json(DataResponse::new(EmptyObject {})).into_response())
}

fn multipart_error(e: MultipartError, limit: usize) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge { limit };
    }
    tracing::warn!("❌ Failed to read upload: {}", e);
    AppError::BadRequest(format!("Invalid multipart body: {}", e))
}

/// Pulls the `file` field out of a multipart body, ignoring any other field.
async fn read_photo(multipart: &mut Multipart, limit: usize) -> Result<Option<UploadedFile>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(PHOTO_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;

        return Ok(Some(UploadedFile {
            file_name,
            content_type,
            bytes,
        }));
    }
    Ok(None)
}

/// Handles replacing a book's photo. The book is loaded and the caller
/// authorized before any of the body is read. A request that is not
/// multipart at all is treated as carrying no file.
#[axum::debug_handler]
pub async fn upload_photo(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    request: Request,
) -> Result<Response> {
    let book = book_service::load_for_change(&state, Some(&caller), id, "update").await?;

    let upload = match Multipart::from_request(request, &state).await {
        Ok(mut multipart) => read_photo(&mut multipart, state.config.max_file_upload).await?,
        Err(rejection) => {
            tracing::debug!("Photo upload without multipart body: {}", rejection);
            None
        }
    };

    let image = book_service::store_photo(&state, book, upload).await?;
    Ok(Json(DataResponse::new(image)).into_response())
}

/// The `{}` payload of a successful delete.
#[derive(Serialize, Debug)]
struct EmptyObject {}
