//! Operation flags.
use bitflags::bitflags;

bitflags! {
    /// Represents the bit vector of options for an OP_UPDATE message.
    pub struct OpUpdateFlags: i32 {
        const UPSERT       = 0b00000001;
        const MULTI_UPDATE = 0b00000010;
    }
}

bitflags! {
    /// Represents the bit vector of flags for an OP_INSERT message.
    pub struct OpInsertFlags: i32 {
        const CONTINUE_ON_ERROR = 0b00000001;
    }
}

bitflags! {
    /// Represents the bit vector of flags for an OP_DELETE message.
    pub struct OpDeleteFlags: i32 {
        const SINGLE_REMOVE = 0b00000001;
    }
}

bitflags! {
    /// Represents the bit vector of flags for an OP_QUERY message.
    pub struct OpQueryFlags: i32 {
        const TAILABLE_CURSOR   = 0b00000010;
        const SLAVE_OK          = 0b00000100;
        const OPLOG_RELAY       = 0b00001000;
        const NO_CURSOR_TIMEOUT = 0b00010000;
        const AWAIT_DATA        = 0b00100000;
        const EXHAUST           = 0b01000000;
        const PARTIAL           = 0b10000000;
    }
}

impl OpUpdateFlags {
    /// Constructs the flags for a single update request.
    pub fn with_update(upsert: bool, multi: bool) -> OpUpdateFlags {
        let mut flags = OpUpdateFlags::empty();

        if upsert {
            flags.insert(Self::UPSERT);
        }

        if multi {
            flags.insert(Self::MULTI_UPDATE);
        }

        flags
    }
}

impl OpQueryFlags {
    /// Constructs the flags for a command, setting `SLAVE_OK` when a
    /// non-primary member may answer it.
    pub fn with_slave_ok(slave_ok: bool) -> OpQueryFlags {
        if slave_ok {
            Self::SLAVE_OK
        } else {
            OpQueryFlags::empty()
        }
    }
}
