pub mod demo;
pub mod detect;
pub mod export;
pub mod index;
pub mod infer;
pub mod normalize;
pub mod query;
pub mod record;
pub mod remote;
pub mod store;
pub mod sync;
pub mod table;

pub use detect::{detect, FormatTag};
pub use export::{export_record, flatten_record, ExportFormat};
pub use index::{
    build_index, load_catalog, scan_storage, CatalogIndex, IndexSource, IndexWarning, ScanReport,
};
pub use infer::{infer_cell_type, infer_columns};
pub use normalize::{
    inspect, load_upload, normalize, normalize_manual, normalize_upload, Inspection, Upload,
};
pub use query::{find_entry, producer_choices, search, ALL_PRODUCERS};
pub use record::{
    CatalogEntry, ColumnSpec, ColumnType, CustomField, DataSample, DraftError, EntrySummary,
    MetadataRecord, RecordDraft, SourceLocation, OTHER_PRODUCER,
};
pub use store::{CatalogStore, SaveOutcome};
pub use sync::{GitSync, NoSync, VersionSync};
pub use table::Table;
