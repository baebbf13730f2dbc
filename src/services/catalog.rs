//! Catalog management service (authors and books)

use validator::Validate;

use crate::{
    config::PaginationConfig,
    error::{AppError, AppResult},
    models::{
        author::{Author, CreateAuthor, UpdateAuthor},
        book::{check_inventory, Book, BookPage, BookQuery, CreateBook, UpdateBook},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    pagination: PaginationConfig,
}

impl CatalogService {
    pub fn new(repository: Repository, pagination: PaginationConfig) -> Self {
        Self {
            repository,
            pagination,
        }
    }

    pub async fn list_authors(&self) -> AppResult<Vec<Author>> {
        self.repository.authors.list().await
    }

    pub async fn get_author(&self, id: i32) -> AppResult<Author> {
        self.repository.authors.get_by_id(id).await
    }

    pub async fn create_author(&self, data: &CreateAuthor) -> AppResult<Author> {
        data.validate()?;
        self.repository.authors.create(data).await
    }

    pub async fn update_author(&self, id: i32, data: &UpdateAuthor) -> AppResult<Author> {
        data.validate()?;
        self.repository.authors.update(id, data).await
    }

    /// Delete an author along with their books; none of them may be on loan
    pub async fn delete_author(&self, id: i32) -> AppResult<()> {
        self.repository.authors.delete(id).await?;
        tracing::info!(author_id = id, "Author deleted");
        Ok(())
    }

    /// One page of the catalog
    pub async fn list_books(&self, query: &BookQuery) -> AppResult<BookPage> {
        let (page, per_page) = self.pagination.window(query.page, query.per_page);
        let (items, total) = self.repository.books.list(page, per_page).await?;

        Ok(BookPage {
            items,
            total,
            page,
            per_page,
        })
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    pub async fn create_book(&self, data: &CreateBook) -> AppResult<Book> {
        data.validate()?;
        check_inventory(
            data.available_copies.unwrap_or(data.total_copies),
            data.total_copies,
        )?;
        self.ensure_author(data.author_id).await?;

        let book = self.repository.books.create(data).await?;
        tracing::info!(book_id = book.id, title = %book.title, "Book created");
        Ok(book)
    }

    pub async fn update_book(&self, id: i32, data: &UpdateBook) -> AppResult<Book> {
        data.validate()?;

        let mut merged = self.repository.books.get_by_id(id).await?;
        merged.apply(data);
        check_inventory(merged.available_copies, merged.total_copies)?;

        if let Some(author_id) = data.author_id {
            self.ensure_author(author_id).await?;
        }

        self.repository.books.update(id, data).await
    }

    /// Delete a book along with its loans
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.books.delete(id).await?;
        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }

    /// Referenced author must exist; reported against the `author_id` field
    async fn ensure_author(&self, author_id: i32) -> AppResult<()> {
        match self.repository.authors.get_by_id(author_id).await {
            Ok(_) => Ok(()),
            Err(AppError::NotFound(_)) => Err(AppError::field(
                "author_id",
                format!("Invalid pk \"{}\" - object does not exist.", author_id),
            )),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> CatalogService {
        CatalogService::new(Repository::in_memory(), PaginationConfig::default())
    }

    fn new_author() -> CreateAuthor {
        CreateAuthor {
            first_name: "Italo".into(),
            last_name: "Calvino".into(),
            biography: None,
            birth_date: None,
        }
    }

    fn new_book(author_id: i32, total: i32, available: Option<i32>) -> CreateBook {
        CreateBook {
            title: "Invisible Cities".into(),
            author_id,
            isbn: Some("9780156453806".into()),
            published_date: None,
            genre: None,
            total_copies: total,
            available_copies: available,
        }
    }

    #[tokio::test]
    async fn test_available_copies_default_to_total() {
        let catalog = service();
        let author = catalog.create_author(&new_author()).await.unwrap();

        let book = catalog.create_book(&new_book(author.id, 4, None)).await.unwrap();
        assert_eq!(book.available_copies, 4);
    }

    #[tokio::test]
    async fn test_inventory_bounds_are_validated() {
        let catalog = service();
        let author = catalog.create_author(&new_author()).await.unwrap();

        let err = catalog.create_book(&new_book(author.id, 2, Some(3))).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref f) if f.contains_key("available_copies")));

        let err = catalog.create_book(&new_book(author.id, -1, None)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref f) if f.contains_key("total_copies")));

        let book = catalog.create_book(&new_book(author.id, 2, None)).await.unwrap();
        let err = catalog
            .update_book(
                book.id,
                &UpdateBook {
                    total_copies: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_book_needs_existing_author() {
        let catalog = service();
        let err = catalog.create_book(&new_book(77, 1, None)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref f) if f.contains_key("author_id")));
    }

    #[tokio::test]
    async fn test_book_pagination_uses_defaults() {
        let catalog = service();
        let author = catalog.create_author(&new_author()).await.unwrap();
        for _ in 0..12 {
            catalog.create_book(&new_book(author.id, 1, None)).await.unwrap();
        }

        let page = catalog.list_books(&BookQuery::default()).await.unwrap();
        assert_eq!(page.total, 12);
        assert_eq!(page.per_page, 10);
        assert_eq!(page.items.len(), 10);

        let page = catalog
            .list_books(&BookQuery {
                page: Some(2),
                per_page: None,
            })
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
    }

    #[tokio::test]
    async fn test_update_author() {
        let catalog = service();
        let author = catalog.create_author(&new_author()).await.unwrap();

        let updated = catalog
            .update_author(
                author.id,
                &UpdateAuthor {
                    biography: Some("Italian writer".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.biography.as_deref(), Some("Italian writer"));
        assert_eq!(updated.last_name, "Calvino");

        let err = catalog
            .update_author(
                author.id,
                &UpdateAuthor {
                    last_name: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
