use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The uniqueness constraint on `article_id` rejected an insert. The
    /// duplicate-check-then-insert race resolves here: the second writer
    /// fails safely instead of double-storing.
    #[error("duplicate article: {0}")]
    Duplicate(String),

    #[error(transparent)]
    Database(#[from] neo4rs::Error),
}

/// Whether a driver error is the store's uniqueness constraint firing.
pub(crate) fn is_constraint_violation(err: &neo4rs::Error) -> bool {
    let text = err.to_string();
    text.contains("ConstraintValidation") || text.contains("already exists")
}
