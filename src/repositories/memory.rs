use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{
        book::{Book, BookStatus, NewBook},
        user::{NewUser, ProfileChanges, Role, User},
    },
    repositories::{
        book::{BookQuery, BookRepository, BookSort},
        user::UserRepository,
    },
    services::search,
};

fn poisoned() -> AppError {
    AppError::Internal("in-memory store lock poisoned".to_string())
}

/// In-memory user storage.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: NewUser) -> Result<User> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        if users.values().any(|u| u.email == user.email) {
            return Err(AppError::validation("email", "Email is already registered"));
        }

        let user = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            role: Role::User,
            university: user.university,
            department: user.department,
            contact_number: user.contact_number,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<User> {
        let mut users = self.users.write().map_err(|_| poisoned())?;

        if let Some(email) = &changes.email {
            if users.values().any(|u| u.id != id && &u.email == email) {
                return Err(AppError::validation("email", "Email is already registered"));
            }
        }

        let user = users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("User not found with id of {}", id)))?;
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(university) = changes.university {
            user.university = university;
        }
        if let Some(department) = changes.department {
            user.department = department;
        }
        if let Some(contact_number) = changes.contact_number {
            user.contact_number = Some(contact_number);
        }
        Ok(user.clone())
    }

    async fn update_password(&self, id: Uuid, password_hash: String) -> Result<()> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        if let Some(user) = users.get_mut(&id) {
            user.password_hash = password_hash;
        }
        Ok(())
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<()> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        if let Some(user) = users.get_mut(&id) {
            user.role = role;
        }
        Ok(())
    }
}

/// In-memory book storage. Keeps insertion order, which is also the
/// tie-break order for search results.
#[derive(Debug, Default)]
pub struct MemoryBookRepository {
    books: RwLock<Vec<Book>>,
}

impl MemoryBookRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookRepository for MemoryBookRepository {
    async fn create(&self, seller: Uuid, book: NewBook) -> Result<Book> {
        let now = Utc::now();
        let book = Book {
            id: Uuid::new_v4(),
            title: book.title,
            author: book.author,
            description: book.description,
            price: book.price,
            condition: book.condition,
            category: book.category,
            seller,
            status: BookStatus::Available,
            images: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.books.write().map_err(|_| poisoned())?.push(book.clone());
        Ok(book)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Book>> {
        let books = self.books.read().map_err(|_| poisoned())?;
        Ok(books.iter().find(|b| b.id == id).cloned())
    }

    async fn list(&self, query: &BookQuery) -> Result<(Vec<Book>, u64)> {
        let books = self.books.read().map_err(|_| poisoned())?;
        let mut matched: Vec<&Book> = books.iter().filter(|b| query.filter.matches(b)).collect();

        match query.sort {
            BookSort::Newest => matched.reverse(),
            BookSort::Oldest => {}
            BookSort::PriceAsc => matched.sort_by(|a, b| a.price.total_cmp(&b.price)),
            BookSort::PriceDesc => matched.sort_by(|a, b| b.price.total_cmp(&a.price)),
            BookSort::TitleAsc => matched.sort_by(|a, b| a.title.cmp(&b.title)),
            BookSort::TitleDesc => matched.sort_by(|a, b| b.title.cmp(&a.title)),
        }

        let total = matched.len() as u64;
        let page = matched
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn save(&self, book: &Book) -> Result<Book> {
        let mut books = self.books.write().map_err(|_| poisoned())?;
        let stored = books
            .iter_mut()
            .find(|b| b.id == book.id)
            .ok_or_else(|| AppError::NotFound(format!("Book not found with id of {}", book.id)))?;

        // Seller and creation time are fixed at insert.
        let seller = stored.seller;
        let created_at = stored.created_at;
        *stored = book.clone();
        stored.seller = seller;
        stored.created_at = created_at;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut books = self.books.write().map_err(|_| poisoned())?;
        let before = books.len();
        books.retain(|b| b.id != id);
        Ok(books.len() != before)
    }

    async fn search(&self, query: &str) -> Result<Vec<Book>> {
        let books = self.books.read().map_err(|_| poisoned())?;
        Ok(search::rank(books.iter(), query)
            .into_iter()
            .map(|(book, _)| book.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::book::{Category, Condition};
    use crate::repositories::book::BookFilter;

    fn draft(title: &str, price: f64) -> NewBook {
        NewBook {
            title: title.to_string(),
            author: "Author".to_string(),
            description: "Description".to_string(),
            price,
            condition: Condition::Good,
            category: Category::Textbooks,
        }
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ada".to_string(),
            email: email.to_string(),
            university: "Uni".to_string(),
            department: "CS".to_string(),
            contact_number: None,
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_validation_error() {
        let repo = MemoryUserRepository::new();
        repo.create(new_user("a@uni.edu")).await.unwrap();
        let err = repo.create(new_user("a@uni.edu")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "email"));
    }

    #[tokio::test]
    async fn created_users_always_get_the_user_role() {
        let repo = MemoryUserRepository::new();
        let user = repo.create(new_user("b@uni.edu")).await.unwrap();
        assert_eq!(user.role, Role::User);
    }

    #[tokio::test]
    async fn save_keeps_the_original_seller() {
        let repo = MemoryBookRepository::new();
        let seller = Uuid::new_v4();
        let mut book = repo.create(seller, draft("Calculus", 10.0)).await.unwrap();
        book.seller = Uuid::new_v4();
        book.price = 12.0;

        let saved = repo.save(&book).await.unwrap();
        assert_eq!(saved.seller, seller);
        assert_eq!(saved.price, 12.0);
    }

    #[tokio::test]
    async fn list_filters_sorts_and_pages() {
        let repo = MemoryBookRepository::new();
        let seller = Uuid::new_v4();
        for (title, price) in [("A", 30.0), ("B", 10.0), ("C", 20.0)] {
            repo.create(seller, draft(title, price)).await.unwrap();
        }

        let query = BookQuery {
            filter: BookFilter {
                max_price: Some(25.0),
                ..Default::default()
            },
            sort: BookSort::PriceAsc,
            offset: 0,
            limit: 1,
        };
        let (page, total) = repo.list(&query).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "B");
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let repo = MemoryBookRepository::new();
        let book = repo.create(Uuid::new_v4(), draft("X", 1.0)).await.unwrap();
        assert!(repo.delete(book.id).await.unwrap());
        assert!(!repo.delete(book.id).await.unwrap());
        assert!(repo.find_by_id(book.id).await.unwrap().is_none());
    }
}
