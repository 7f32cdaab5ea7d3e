//! Return codes: the flat error-value contract used along every fallible
//! path in the core instead of panics or unwinding.

use thiserror::Error;

/// Flat return-code enum. `Success` is the only non-error outcome besides
/// the iterator-terminal [`RC::RecordEof`], which callers must special-case
/// rather than treat as a normal error.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RC {
    #[error("success")]
    Success,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("unimplemented")]
    Unimplemented,
    #[error("sql syntax error")]
    SqlSyntax,
    #[error("internal error")]
    Internal,
    #[error("out of memory")]
    NoMem,
    #[error("not found")]
    NotFound,
    #[error("empty")]
    Empty,
    #[error("full")]
    Full,
    #[error("already exists")]
    Exist,
    #[error("does not exist")]
    NotExist,

    #[error("buffer pool already open")]
    BufferpoolOpen,
    #[error("buffer pool has no free buffer")]
    BufferpoolNobuf,
    #[error("invalid page number")]
    BufferpoolInvalidPageNum,

    #[error("record file already open")]
    RecordOpenned,
    #[error("invalid rid")]
    RecordInvalidRid,
    #[error("invalid key")]
    RecordInvalidKey,
    #[error("duplicate key")]
    RecordDuplicateKey,
    #[error("record allocation failed")]
    RecordNomem,
    /// Terminal, non-error signal: an iterator has no more rows.
    #[error("end of records")]
    RecordEof,
    #[error("record does not exist")]
    RecordNotExist,
    #[error("record not visible")]
    RecordInvisible,

    #[error("database already exists")]
    SchemaDbExist,
    #[error("database does not exist")]
    SchemaDbNotExist,
    #[error("database not opened")]
    SchemaDbNotOpened,
    #[error("table does not exist")]
    SchemaTableNotExist,
    #[error("table already exists")]
    SchemaTableExist,
    #[error("field does not exist")]
    SchemaFieldNotExist,
    #[error("field missing")]
    SchemaFieldMissing,
    #[error("field type mismatch")]
    SchemaFieldTypeMismatch,
    #[error("index name repeated")]
    SchemaIndexNameRepeat,

    #[error("io read error")]
    IoerrRead,
    #[error("io write error")]
    IoerrWrite,
    #[error("io access error")]
    IoerrAccess,
    #[error("io open error")]
    IoerrOpen,
    #[error("io close error")]
    IoerrClose,
    #[error("io seek error")]
    IoerrSeek,
    #[error("io value too long")]
    IoerrTooLong,
    #[error("io sync error")]
    IoerrSync,

    #[error("lock not held")]
    LockedUnlock,
    #[error("lock needs wait")]
    LockedNeedWait,
    #[error("lock concurrency conflict")]
    LockedConcurrencyConflict,

    #[error("file already exists")]
    FileExist,
    #[error("file does not exist")]
    FileNotExist,
    #[error("bad file name")]
    FileName,
    #[error("file bound exceeded")]
    FileBound,
    #[error("file create error")]
    FileCreate,
    #[error("file open error")]
    FileOpen,
    #[error("file not opened")]
    FileNotOpened,
    #[error("file close error")]
    FileClose,
    #[error("file remove error")]
    FileRemove,

    #[error("variable does not exist")]
    VariableNotExists,
    #[error("variable not valid")]
    VariableNotValid,

    #[error("log buffer full")]
    LogbufFull,
    #[error("log file full")]
    LogFileFull,
    #[error("invalid log entry")]
    LogEntryInvalid,

    #[error("unsupported")]
    Unsupported,
    #[error("value type mismatch")]
    ValueTypeMismatch,
}

impl RC {
    /// True for the single non-error outcome.
    pub fn is_ok(self) -> bool {
        self == RC::Success
    }

    /// True for the iterator-terminal signal, which is not an error.
    pub fn is_eof(self) -> bool {
        self == RC::RecordEof
    }
}

impl Default for RC {
    fn default() -> Self {
        RC::Success
    }
}

/// Result alias used everywhere a C++ `RC` return would appear.
pub type Result<T> = std::result::Result<T, RC>;

/// Convert an `RC` other than `Success`/`RecordEof` into a `Result<()>`.
pub fn rc_result(rc: RC) -> Result<()> {
    if rc == RC::Success {
        Ok(())
    } else {
        Err(rc)
    }
}
