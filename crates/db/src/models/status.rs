//! Status helper enums mapping to SMALLSERIAL/SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Processing-job lifecycle status.
    ///
    /// Discriminants match `groundwatch_core::job_states::STATUS_*`.
    JobStatus {
        Pending = 1,
        Running = 2,
        Succeeded = 3,
        Failed = 4,
        Cancelled = 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groundwatch_core::job_states;

    #[test]
    fn ids_match_core_state_machine() {
        assert_eq!(JobStatus::Pending.id(), job_states::STATUS_PENDING);
        assert_eq!(JobStatus::Running.id(), job_states::STATUS_RUNNING);
        assert_eq!(JobStatus::Succeeded.id(), job_states::STATUS_SUCCEEDED);
        assert_eq!(JobStatus::Failed.id(), job_states::STATUS_FAILED);
        assert_eq!(JobStatus::Cancelled.id(), job_states::STATUS_CANCELLED);
    }
}
