use crate::{
    error::{QueryError, QueryInputError, StoreError},
    invariants::StatusCode,
    models::StoredRecord,
    store::SqliteStore,
};

/// Read-only access to stored records, in storage order.
#[derive(Debug, Clone)]
pub struct QueryService {
    store: SqliteStore,
}

impl QueryService {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }

    pub fn list_all(&self) -> Result<Vec<StoredRecord>, StoreError> {
        self.store.list_all()
    }

    /// Filters by a status code typed by a user.
    pub fn filter_by_status(&self, input: &str) -> Result<Vec<StoredRecord>, QueryError> {
        let status = parse_status_input(input)?;
        Ok(self.store.by_status(status)?)
    }
}

pub fn parse_status_input(input: &str) -> Result<StatusCode, QueryInputError> {
    let input = input.trim();
    let code: i64 = input
        .parse()
        .map_err(|_| QueryInputError::NotANumber(input.to_string()))?;
    u16::try_from(code)
        .ok()
        .and_then(StatusCode::new)
        .ok_or(QueryInputError::OutOfRange(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        RecordSink,
        tests::{record, temp_store},
    };
    use asserting::prelude::*;

    #[test]
    fn filter_by_status_returns_matches_in_storage_order() {
        let (_dir, store) = temp_store();
        store
            .insert_batch(&[
                record(200, "/ok"),
                record(404, "/first"),
                record(404, "/second"),
                record(500, "/boom"),
            ])
            .unwrap();
        let query = QueryService::new(store);

        let found: Vec<_> = query
            .filter_by_status("404")
            .unwrap()
            .into_iter()
            .map(|s| (s.record.status.as_u16(), s.record.path))
            .collect();
        assert_that!(found).is_equal_to(vec![
            (404, "/first".to_string()),
            (404, "/second".to_string()),
        ]);
        assert_that!(query.list_all().unwrap().len()).is_equal_to(4);
    }

    #[test]
    fn invalid_filter_input_is_an_input_error() {
        let (_dir, store) = temp_store();
        let query = QueryService::new(store);

        assert_that!(matches!(
            query.filter_by_status("abc"),
            Err(QueryError::Input(QueryInputError::NotANumber(_)))
        ))
        .is_true();
        assert_that!(matches!(
            query.filter_by_status("42"),
            Err(QueryError::Input(QueryInputError::OutOfRange(42)))
        ))
        .is_true();
        assert_that!(matches!(
            query.filter_by_status("-1"),
            Err(QueryError::Input(QueryInputError::OutOfRange(-1)))
        ))
        .is_true();
    }

    #[test]
    fn parse_status_input_trims_whitespace() {
        assert_that!(parse_status_input(" 503\n").map(StatusCode::as_u16)).is_equal_to(Ok(503));
    }
}
