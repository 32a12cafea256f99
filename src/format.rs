//! The seam between the splitter and a container format
//!
//! The planner and the executor never touch bytes themselves. Everything they
//! need from a format (counting records, listing identifiers, creating a chunk
//! file and copying a selection of records into it) goes through [`Format`].
//! [`Bq`](crate::bq::Bq) is the implementation shipped with this crate.

use std::fmt::{Debug, Display};
use std::path::Path;

use crate::Result;

/// Read access to an opened container file
pub trait FormatReader {
    /// Identifier type of the records in the file
    type Id;

    /// The number of records the file declares
    fn num_records(&self) -> usize;

    /// Identifiers of all records in file order
    ///
    /// Single pass. Iterating again requires another call.
    fn identifiers(&self) -> impl Iterator<Item = Self::Id> + '_;
}

/// A container format able to repack a selection of records into a new file
///
/// Readers and writers are opened per job and never cross a thread boundary,
/// so only the format value itself has to be `Send + Sync`.
pub trait Format: Send + Sync {
    /// Opaque identifier of one record
    type Id: Clone + Debug + Display + Send + Sync + 'static;

    /// Handle on an opened source file
    type Reader: FormatReader<Id = Self::Id>;

    /// Handle on a chunk file being written
    type Writer;

    /// File extension used when the source path has none
    fn default_extension(&self) -> &'static str;

    /// Opens a source file for reading
    fn open_reader(&self, path: &Path) -> Result<Self::Reader>;

    /// Creates a new, empty output file compatible with `source`
    fn create_writer(&self, path: &Path, source: &Self::Reader) -> Result<Self::Writer>;

    /// Copies exactly the records named by `ids` from `source` to `dest`
    ///
    /// Record contents are copied unchanged. Returns the number of records
    /// copied and fails if any identifier is absent from `source`.
    fn copy_selected(
        &self,
        source: &Self::Reader,
        dest: &mut Self::Writer,
        ids: &[Self::Id],
    ) -> Result<usize>;

    /// Flushes and closes a writer
    fn finish(&self, writer: Self::Writer) -> Result<()>;
}
