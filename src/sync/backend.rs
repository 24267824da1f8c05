//! The remote spreadsheet seam.

use futures::future::BoxFuture;

use crate::errors::AppError;

/// A worksheet whose first row is the header.
pub trait SheetBackend: Send + Sync {
    /// Column names from row 1, in sheet order.
    fn header_row(&self) -> BoxFuture<'_, Result<Vec<String>, AppError>>;

    /// Every row including the header.
    fn all_rows(&self) -> BoxFuture<'_, Result<Vec<Vec<String>>, AppError>>;

    /// Overwrite the region starting at row 2, leaving the header untouched.
    fn write_below_header(&self, rows: Vec<Vec<String>>) -> BoxFuture<'_, Result<(), AppError>>;
}

#[cfg(test)]
pub mod memory {
    //! In-memory worksheet for exercising sync paths without a network.

    use std::sync::Mutex;

    use futures::FutureExt;

    use super::*;

    #[derive(Debug, Default)]
    pub struct MemorySheet {
        rows: Mutex<Vec<Vec<String>>>,
        fail_with: Mutex<Option<fn() -> AppError>>,
    }

    impl MemorySheet {
        pub fn with_rows(rows: Vec<Vec<&str>>) -> Self {
            let rows = rows
                .into_iter()
                .map(|r| r.into_iter().map(str::to_string).collect())
                .collect();
            Self {
                rows: Mutex::new(rows),
                fail_with: Mutex::new(None),
            }
        }

        /// Make every later call fail with the given error.
        pub fn fail_with(&self, make: fn() -> AppError) {
            *self.fail_with.lock().unwrap() = Some(make);
        }

        pub fn rows(&self) -> Vec<Vec<String>> {
            self.rows.lock().unwrap().clone()
        }

        fn check(&self) -> Result<(), AppError> {
            match *self.fail_with.lock().unwrap() {
                Some(make) => Err(make()),
                None => Ok(()),
            }
        }
    }

    impl SheetBackend for MemorySheet {
        fn header_row(&self) -> BoxFuture<'_, Result<Vec<String>, AppError>> {
            let result = self
                .check()
                .map(|()| self.rows.lock().unwrap().first().cloned().unwrap_or_default());
            async move { result }.boxed()
        }

        fn all_rows(&self) -> BoxFuture<'_, Result<Vec<Vec<String>>, AppError>> {
            let result = self.check().map(|()| self.rows());
            async move { result }.boxed()
        }

        fn write_below_header(
            &self,
            new_rows: Vec<Vec<String>>,
        ) -> BoxFuture<'_, Result<(), AppError>> {
            let result = self.check().map(|()| {
                let mut rows = self.rows.lock().unwrap();
                for (offset, row) in new_rows.into_iter().enumerate() {
                    let idx = offset + 1;
                    if idx < rows.len() {
                        rows[idx] = row;
                    } else {
                        rows.push(row);
                    }
                }
            });
            async move { result }.boxed()
        }
    }
}
