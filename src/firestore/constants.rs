pub(crate) const DEFAULT_DATABASE_ID: &str = "(default)";

/// Reserved field name that refers to a document's own key.
pub(crate) const DOCUMENT_KEY_NAME: &str = "__name__";

pub(crate) const TYPE_KEY: &str = "__type__";
pub(crate) const VECTOR_TYPE: &str = "__vector__";
pub(crate) const VECTOR_VALUE_KEY: &str = "value";
pub(crate) const SERVER_TIMESTAMP_TYPE: &str = "server_timestamp";
pub(crate) const LOCAL_WRITE_TIME_KEY: &str = "__local_write_time__";
pub(crate) const PREVIOUS_VALUE_KEY: &str = "__previous_value__";
