use axum::http::StatusCode;
use bookshare_db::DbError;
use tracing::{debug, error, warn};

/// Client mistakes (missing rows, foreign resources, taken names) become 4xx
/// responses; integrity violations and store failures become 500 and are
/// logged loudly.
pub fn status_for(err: DbError) -> StatusCode {
    match &err {
        DbError::NotFound { .. } => {
            debug!("{}", err);
            StatusCode::NOT_FOUND
        }
        DbError::PermissionDenied(_) => {
            warn!("{}", err);
            StatusCode::FORBIDDEN
        }
        DbError::Conflict(_) => StatusCode::CONFLICT,
        DbError::IntegrityViolation(_) => {
            error!("Data integrity error: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
        DbError::Sqlite(_) | DbError::LockPoisoned | DbError::Internal(_) => {
            error!("Database error: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_distinct_statuses() {
        let not_found = DbError::NotFound {
            entity: "book instance",
            key: "3".into(),
        };
        assert_eq!(status_for(not_found), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(DbError::PermissionDenied("not yours".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(DbError::IntegrityViolation("counter at 0".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status_for(DbError::Conflict("taken".into())), StatusCode::CONFLICT);
    }
}
