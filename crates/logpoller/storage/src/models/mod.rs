//! Database table schemas used by the log poller.
//!
//! This module defines the value types, keys, and table layouts for all data persisted by the
//! log poller.
//!
//! Blocks are keyed by height with a hash index beside them. Logs are keyed by
//! `(block, index, tx hash)` and mirrored in an `(address, event)` index used by scoped queries
//! and retention.

mod block;
pub use block::{BlockHashes, BlockRecord, Blocks};
mod log;
pub use log::{EventLogKey, EventLogs, LogKey, LogRecord, Logs};
mod filter;
pub use filter::{FilterRecord, Filters};

use reth_db_api::{
    TableSet,
    table::{Table, TableInfo},
};

/// Stores RLP encodable records as table values.
macro_rules! impl_compression_for_rlp {
    ($($name:ident),+ $(,)?) => {
        $(
            impl reth_db_api::table::Compress for $name {
                type Compressed = Vec<u8>;

                fn compress_to_buf<B: bytes::BufMut + AsMut<[u8]>>(&self, buf: &mut B) {
                    alloy_rlp::Encodable::encode(self, buf);
                }
            }

            impl reth_db_api::table::Decompress for $name {
                fn decompress(mut value: &[u8]) -> Result<$name, reth_db_api::DatabaseError> {
                    <$name as alloy_rlp::Decodable>::decode(&mut value)
                        .map_err(|_| reth_db_api::DatabaseError::Decode)
                }
            }
        )+
    };
}

impl_compression_for_rlp!(BlockRecord, LogRecord, FilterRecord);

/// Name and dupsort flag of a table, as the environment initializer needs them.
#[derive(Debug, Clone, Copy)]
struct TableMeta {
    name: &'static str,
    dupsort: bool,
}

impl TableMeta {
    const fn of<T: Table>() -> Self {
        Self { name: T::NAME, dupsort: T::DUPSORT }
    }
}

impl TableInfo for TableMeta {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_dupsort(&self) -> bool {
        self.dupsort
    }
}

/// Every table of a log poller chain database, opened by `init_db_for`.
#[derive(Debug)]
pub(crate) struct Tables;

impl TableSet for Tables {
    fn tables() -> Box<dyn Iterator<Item = Box<dyn TableInfo>>> {
        let tables = [
            TableMeta::of::<Blocks>(),
            TableMeta::of::<BlockHashes>(),
            TableMeta::of::<Logs>(),
            TableMeta::of::<EventLogs>(),
            TableMeta::of::<Filters>(),
        ];
        Box::new(tables.into_iter().map(|meta| Box::new(meta) as Box<dyn TableInfo>))
    }
}
