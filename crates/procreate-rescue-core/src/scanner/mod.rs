mod walk;

pub use walk::{is_document_root, scan_documents, DocumentWalker, DESCRIPTOR_FILE_NAME};
