// src/types.rs

//! Closed enumerations shared by the model, the engine and the wire formats.
//!
//! Every enum is parsed case-insensitively from its canonical upper-case
//! spelling (`"FINALIZED"`, `"rebuild_mesh"`, ...) and serialized back in
//! upper case, so the same types serve the TOML config and the webhook
//! payload.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! closed_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "&'static str")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Canonical upper-case spelling.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                $(
                    if wanted.eq_ignore_ascii_case($text) {
                        return Ok($name::$variant);
                    }
                )+
                Err(format!(
                    "invalid {}: {:?} (expected one of {:?})",
                    stringify!($name),
                    wanted,
                    [$($text),+]
                ))
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(s: String) -> Result<Self, String> {
                s.parse()
            }
        }

        impl From<$name> for &'static str {
            fn from(value: $name) -> Self {
                value.as_str()
            }
        }
    };
}

closed_enum! {
    /// Scope of a parent edge, a checkup, or the last build of a job.
    ///
    /// A job status only ever carries `Full` or `Partial`; `Optional` only
    /// appears on parent edges and `Anyone` only on checkups.
    pub enum Scope {
        Full => "FULL",
        Partial => "PARTIAL",
        Optional => "OPTIONAL",
        Anyone => "ANYONE",
    }
}

impl Default for Scope {
    fn default() -> Self {
        Scope::Full
    }
}

closed_enum! {
    /// Lifecycle state of a job's last significant event.
    pub enum Flow {
        /// Initial / healthy.
        Normal => "NORMAL",
        /// Trigger accepted by the build server.
        Queued => "QUEUED",
        /// Scheduled to run again (manually, by a remediation or a mesh rebuild).
        Rebuild => "REBUILD",
        /// Finished, but not FINALIZED/SUCCESS.
        Transient => "TRANSIENT",
        /// Checkup evaluation in progress.
        Checkup => "CHECKUP",
        /// Post-validation failed; needs approval.
        Unhealthy => "UNHEALTHY",
        /// Pre-validation failed; needs approval.
        Blocked => "BLOCKED",
        Approved => "APPROVED",
        Disapproved => "DISAPPROVED",
        /// Trigger attempt failed.
        Error => "ERROR",
    }
}

impl Default for Flow {
    fn default() -> Self {
        Flow::Normal
    }
}

impl Flow {
    /// Flows that stamp the status' failure timestamp.
    pub fn is_failure(self) -> bool {
        match self {
            Flow::Unhealthy | Flow::Blocked | Flow::Error => true,
            Flow::Normal
            | Flow::Queued
            | Flow::Rebuild
            | Flow::Transient
            | Flow::Checkup
            | Flow::Approved
            | Flow::Disapproved => false,
        }
    }

    /// Flows that are waiting for a human decision.
    pub fn awaits_approval(self) -> bool {
        matches!(self, Flow::Unhealthy | Flow::Blocked)
    }

    /// Flows under which a finalized successful build counts as built.
    pub fn is_settled(self) -> bool {
        matches!(self, Flow::Normal | Flow::Approved)
    }
}

closed_enum! {
    /// Build-server lifecycle phase reported by the notification plugin.
    pub enum Phase {
        Queued => "QUEUED",
        Started => "STARTED",
        Completed => "COMPLETED",
        Finalized => "FINALIZED",
    }
}

impl Phase {
    /// Position of the phase in a build's lifecycle.
    pub fn rank(self) -> u8 {
        match self {
            Phase::Queued => 0,
            Phase::Started => 1,
            Phase::Completed => 2,
            Phase::Finalized => 3,
        }
    }

    /// Whether an event in this phase replaces the job status.
    pub fn updates_status(self) -> bool {
        match self {
            Phase::Started | Phase::Finalized => true,
            Phase::Queued | Phase::Completed => false,
        }
    }
}

closed_enum! {
    /// Result reported by the build server for a build.
    pub enum BuildStatus {
        Success => "SUCCESS",
        Failure => "FAILURE",
        Aborted => "ABORTED",
        Unstable => "UNSTABLE",
        NotBuilt => "NOT_BUILT",
        Running => "RUNNING",
    }
}

impl BuildStatus {
    /// Statuses that count as a broken build.
    pub fn is_broken(self) -> bool {
        matches!(self, BuildStatus::Failure | BuildStatus::Aborted)
    }
}

closed_enum! {
    /// Comparator applied between a checkup value and its threshold.
    pub enum Conditional {
        Equal => "EQUAL",
        NotEqual => "NOT_EQUAL",
        LowerThan => "LOWER_THAN",
        LowerThanOrEqual => "LOWER_THAN_OR_EQUAL",
        GreaterThan => "GREATER_THAN",
        GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
    }
}

impl Default for Conditional {
    fn default() -> Self {
        Conditional::Equal
    }
}

closed_enum! {
    /// What happens when a checkup still fails after its commands ran.
    pub enum Action {
        /// Record the failure and keep evaluating.
        LogAndContinue => "LOG_AND_CONTINUE",
        /// Trigger the job again.
        Rebuild => "REBUILD",
        /// Mark the whole ancestor mesh for rebuild and trigger its roots.
        RebuildMesh => "REBUILD_MESH",
        /// Mark the paths to the trigger jobs for rebuild and trigger them.
        RebuildTrigger => "REBUILD_TRIGGER",
        /// Stop propagation and wait for approval.
        Abort => "ABORT",
    }
}

impl Default for Action {
    fn default() -> Self {
        Action::Abort
    }
}

closed_enum! {
    /// Kind of a remediation command.
    pub enum CommandKind {
        Sql => "SQL",
        Shell => "SHELL",
    }
}

impl Default for CommandKind {
    fn default() -> Self {
        CommandKind::Shell
    }
}

closed_enum! {
    /// Role of the actor deciding an approval.
    pub enum Role {
        /// Base role: may only approve jobs they are the approver of.
        User => "USER",
        Admin => "ADMIN",
        Hero => "HERO",
    }
}

closed_enum! {
    /// Status derived for display and for the watchdog's stall detection.
    pub enum DisplayStatus {
        Waiting => "WAITING",
        Restricted => "RESTRICTED",
        Disabled => "DISABLED",
        Rebuild => "REBUILD",
        Queued => "QUEUED",
        Running => "RUNNING",
        Success => "SUCCESS",
        Failure => "FAILURE",
        Aborted => "ABORTED",
        Unstable => "UNSTABLE",
        NotBuilt => "NOT_BUILT",
        Unhealthy => "UNHEALTHY",
        Blocked => "BLOCKED",
        Approved => "APPROVED",
        Disapproved => "DISAPPROVED",
        Error => "ERROR",
        Checkup => "CHECKUP",
    }
}

impl From<BuildStatus> for DisplayStatus {
    fn from(status: BuildStatus) -> Self {
        match status {
            BuildStatus::Success => DisplayStatus::Success,
            BuildStatus::Failure => DisplayStatus::Failure,
            BuildStatus::Aborted => DisplayStatus::Aborted,
            BuildStatus::Unstable => DisplayStatus::Unstable,
            BuildStatus::NotBuilt => DisplayStatus::NotBuilt,
            BuildStatus::Running => DisplayStatus::Running,
        }
    }
}

impl From<Flow> for DisplayStatus {
    fn from(flow: Flow) -> Self {
        match flow {
            Flow::Normal | Flow::Transient => DisplayStatus::Waiting,
            Flow::Queued => DisplayStatus::Queued,
            Flow::Rebuild => DisplayStatus::Rebuild,
            Flow::Checkup => DisplayStatus::Checkup,
            Flow::Unhealthy => DisplayStatus::Unhealthy,
            Flow::Blocked => DisplayStatus::Blocked,
            Flow::Approved => DisplayStatus::Approved,
            Flow::Disapproved => DisplayStatus::Disapproved,
            Flow::Error => DisplayStatus::Error,
        }
    }
}
