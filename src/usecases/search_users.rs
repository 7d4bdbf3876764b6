use crate::domain::{
    errors::{FetchError, SourceError, ValidationError},
    user::User,
};

pub trait UserSearchSource {
    fn search_by_phone(&self, digits: &str) -> Result<Vec<User>, SourceError>;
}

impl<T> UserSearchSource for &T
where
    T: UserSearchSource + ?Sized,
{
    fn search_by_phone(&self, digits: &str) -> Result<Vec<User>, SourceError> {
        (*self).search_by_phone(digits)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Request(#[from] FetchError),
}

/// Keeps only the digits of a phone query; an empty result is rejected.
pub fn normalize_phone_query(raw: &str) -> Result<String, ValidationError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(ValidationError::EmptyQuery);
    }

    Ok(digits)
}

pub fn search_users(source: &dyn UserSearchSource, raw_query: &str) -> Result<Vec<User>, SearchError> {
    let digits = normalize_phone_query(raw_query)?;
    let users = source
        .search_by_phone(&digits)
        .map_err(FetchError::from)?;

    Ok(users)
}

/// Chooses the user a phone query refers to: the exact phone match, else the
/// only result. Ambiguous result sets yield `None`.
pub fn pick_user<'a>(users: &'a [User], digits: &str) -> Option<&'a User> {
    users
        .iter()
        .find(|user| user.phone == digits)
        .or(match users {
            [only] => Some(only),
            _ => None,
        })
}
