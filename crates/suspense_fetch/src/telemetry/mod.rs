// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured logging of fetch activity.

use std::sync::Arc;

use suspense_cache::{ArgsKind, OperationKey};

#[cfg(all(test, feature = "logs"))]
pub(crate) mod testing;

/// What happened to a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FetchActivity {
    /// Served from the result cache.
    Hit,
    /// Not in the result cache, or expired there.
    Miss,
    /// Joined a pending in-flight call.
    Joined,
    /// Registered a new in-flight call.
    Invoked,
    /// Moved a resolved value into the result cache.
    Promoted,
    /// Surfaced an operation failure.
    Rejected,
    /// Removed a cached result on request.
    Invalidated,
}

impl FetchActivity {
    #[cfg_attr(not(feature = "logs"), expect(dead_code, reason = "only consulted when logs are compiled in"))]
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Joined => "joined",
            Self::Invoked => "invoked",
            Self::Promoted => "promoted",
            Self::Rejected => "rejected",
            Self::Invalidated => "invalidated",
        }
    }

    #[cfg_attr(not(feature = "logs"), expect(dead_code, reason = "only consulted when logs are compiled in"))]
    fn is_notable(self) -> bool {
        matches!(self, Self::Rejected | Self::Invalidated)
    }
}

/// Records fetch activity for one scope.
#[derive(Clone, Debug)]
pub(crate) struct FetchTelemetry {
    scope: Arc<str>,
    logs_enabled: bool,
}

impl FetchTelemetry {
    pub(crate) fn new(scope: Arc<str>, logs_enabled: bool) -> Self {
        Self { scope, logs_enabled }
    }

    pub(crate) fn logs_enabled(&self) -> bool {
        self.logs_enabled
    }

    #[inline]
    pub(crate) fn record(&self, activity: FetchActivity, operation: &OperationKey, kind: ArgsKind) {
        if self.logs_enabled {
            Self::emit(&self.scope, activity, operation, kind);
        }
    }

    #[cfg(feature = "logs")]
    fn emit(scope: &str, activity: FetchActivity, operation: &OperationKey, kind: ArgsKind) {
        let id = operation.id().get();
        let description = operation.description();
        let act = activity.as_str();
        let args = kind.as_str();

        // Tracing level must be constant, so the macro picks the level per branch.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    fetch.scope = scope,
                    fetch.activity = act,
                    fetch.operation_id = id,
                    fetch.operation = description,
                    fetch.args = args,
                    "fetch.event"
                )
            };
        }

        if activity.is_notable() {
            emit_event!(info);
        } else {
            emit_event!(debug);
        }
    }

    #[cfg(not(feature = "logs"))]
    fn emit(_scope: &str, _activity: FetchActivity, _operation: &OperationKey, _kind: ArgsKind) {}
}

#[cfg(all(test, feature = "logs"))]
mod tests {
    use super::*;
    use crate::telemetry::testing::LogCapture;

    #[test]
    fn emit_contains_all_fields() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        let op = OperationKey::new("load_profile");

        FetchTelemetry::new(Arc::from("profile_page"), true).record(FetchActivity::Invoked, &op, ArgsKind::Simple);

        capture.assert_contains("fetch.event");
        capture.assert_contains("profile_page");
        capture.assert_contains("invoked");
        capture.assert_contains("load_profile");
        capture.assert_contains("simple");
        capture.assert_contains("DEBUG");
    }

    #[test]
    fn notable_activity_logs_at_info() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        let op = OperationKey::new("op");

        FetchTelemetry::new(Arc::from("scope"), true).record(FetchActivity::Rejected, &op, ArgsKind::Complicated);

        capture.assert_contains("INFO");
        capture.assert_contains("rejected");
        capture.assert_contains("complicated");
    }

    #[test]
    fn disabled_telemetry_emits_nothing() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        let op = OperationKey::new("op");

        let telemetry = FetchTelemetry::new(Arc::from("scope"), false);
        telemetry.record(FetchActivity::Hit, &op, ArgsKind::Simple);

        assert!(!telemetry.logs_enabled());
        assert!(capture.output().is_empty());
    }

    #[test]
    fn activity_labels_are_distinct() {
        let all = [
            FetchActivity::Hit,
            FetchActivity::Miss,
            FetchActivity::Joined,
            FetchActivity::Invoked,
            FetchActivity::Promoted,
            FetchActivity::Rejected,
            FetchActivity::Invalidated,
        ];
        let mut labels: Vec<_> = all.iter().map(|a| a.as_str()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), all.len());
    }
}
