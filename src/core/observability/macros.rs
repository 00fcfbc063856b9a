
/// Creates a root span based on the provided sampling rate.
/// This is required because if we simply used the instrument
/// attribute then it would still do a lot of the heavy lifting
/// in terms of collecting and cloning context, which is
/// convenient but bad for performance. This makes span sampling
/// a pre-filter, and while more effort it prevents the overhead.
///
/// # Arguments
/// * `sample_percent` - The percent (0.0 to 1.0) of spans to sample
/// * `span_name` - The name of the span if created (must be a literal)
///
/// # Behavior
/// - If a parent span exists (is active): ALWAYS creates a child span (preserves complete trace)
/// - If no parent exists: Makes sampling decision at the configured rate
///
/// This implements head-based sampling where the root makes the decision,
/// and all children are included to maintain trace completeness.
///
/// # Returns
/// - Real span if parent exists OR sampling passes
/// - `Span::none()` if no parent and sampling fails
#[macro_export]
macro_rules! sample_or_attach_root_span {
    ($sample_percent:expr, $span_name:literal) => {{
        let current = tracing::Span::current();

        if !current.is_disabled() || fastrand::f32() < $sample_percent {
            tracing::info_span!($span_name)
        } else {
            tracing::Span::none()
        }
    }};
    ($sample_percent:expr, $span_name:literal, $($fields:tt)*) => {{
        let current = tracing::Span::current();

        if !current.is_disabled() || fastrand::f32() < $sample_percent {
            tracing::info_span!($span_name, $($fields)*)
        } else {
            tracing::Span::none()
        }
    }};
}

/// Creates a TRACE-level child span only if the parent span is active (sampled).
///
/// This enables zero-overhead span creation for unsampled requests - when the
/// parent span is disabled, this returns `Span::none()` without any overhead.
///
/// # Returns
/// An **un-entered** `Span` - you must call `.entered()` or use `.instrument()`.
#[macro_export]
macro_rules! child_span_trace {
    ($span_name:literal) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::trace_span!($span_name)
        } else {
            ::tracing::Span::none()
        }
    }};
    ($span_name:literal, $($fields:tt)*) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::trace_span!($span_name, $($fields)*)
        } else {
            ::tracing::Span::none()
        }
    }};
}

/// Creates a DEBUG-level child span only if the parent span is active (sampled).
///
/// See [`child_span_info!`] for behavior details.
#[macro_export]
macro_rules! child_span_debug {
    ($span_name:literal) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::debug_span!($span_name)
        } else {
            ::tracing::Span::none()
        }
    }};
    ($span_name:literal, $($fields:tt)*) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::debug_span!($span_name, $($fields)*)
        } else {
            ::tracing::Span::none()
        }
    }};
}

/// Creates an INFO-level child span only if the parent span is active (sampled).
///
/// This enables zero-overhead span creation for unsampled requests - when the
/// parent span is disabled, this returns `Span::none()` without any overhead.
///
/// # Returns
/// An **un-entered** `Span` - you must call `.entered()` or use `.instrument()`.
///
/// # Arguments
/// * `span_name` - Name for the span (must be a literal)
/// * `fields` - Optional span fields (e.g., `field1 = value1, field2 = %value2`)
#[macro_export]
macro_rules! child_span_info {
    ($span_name:literal) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::info_span!($span_name)
        } else {
            ::tracing::Span::none()
        }
    }};
    ($span_name:literal, $($fields:tt)*) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::info_span!($span_name, $($fields)*)
        } else {
            ::tracing::Span::none()
        }
    }};
}

/// Creates a WARN-level child span only if the parent span is active (sampled).
///
/// See [`child_span_info!`] for behavior details.
#[macro_export]
macro_rules! child_span_warn {
    ($span_name:literal) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::warn_span!($span_name)
        } else {
            ::tracing::Span::none()
        }
    }};
    ($span_name:literal, $($fields:tt)*) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::warn_span!($span_name, $($fields)*)
        } else {
            ::tracing::Span::none()
        }
    }};
}
