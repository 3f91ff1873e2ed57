use crate::SyncError;

/// The unit of reactive state: a value that is still loading, has loaded, or has failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsyncValue<T> {
    Pending,
    Complete(T),
    Error(SyncError),
}

impl<T> AsyncValue<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, AsyncValue::Pending)
    }
    pub fn is_complete(&self) -> bool {
        matches!(self, AsyncValue::Complete(_))
    }
    pub fn is_error(&self) -> bool {
        matches!(self, AsyncValue::Error(_))
    }

    /// Returns the completed value, if any.
    pub fn complete(&self) -> Option<&T> {
        match self {
            AsyncValue::Complete(value) => Some(value),
            _ => None,
        }
    }
    pub fn error(&self) -> Option<&SyncError> {
        match self {
            AsyncValue::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> AsyncValue<&T> {
        match self {
            AsyncValue::Pending => AsyncValue::Pending,
            AsyncValue::Complete(value) => AsyncValue::Complete(value),
            AsyncValue::Error(e) => AsyncValue::Error(e.clone()),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> AsyncValue<U> {
        match self {
            AsyncValue::Pending => AsyncValue::Pending,
            AsyncValue::Complete(value) => AsyncValue::Complete(f(value)),
            AsyncValue::Error(e) => AsyncValue::Error(e),
        }
    }

    /// `None` while pending.
    pub fn into_result(self) -> Option<Result<T, SyncError>> {
        match self {
            AsyncValue::Pending => None,
            AsyncValue::Complete(value) => Some(Ok(value)),
            AsyncValue::Error(e) => Some(Err(e)),
        }
    }
}

impl<T> Default for AsyncValue<T> {
    fn default() -> Self {
        AsyncValue::Pending
    }
}

impl<T> From<Result<T, SyncError>> for AsyncValue<T> {
    fn from(result: Result<T, SyncError>) -> Self {
        match result {
            Ok(value) => AsyncValue::Complete(value),
            Err(e) => AsyncValue::Error(e),
        }
    }
}
