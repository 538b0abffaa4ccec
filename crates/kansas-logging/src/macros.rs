//! ---
//! kansas_section: "03-logging-metrics"
//! kansas_subsection: "module"
//! kansas_type: "source"
//! kansas_scope: "code"
//! kansas_description: "Structured logging adapters for simulated users."
//! kansas_version: "v0.1.0"
//! kansas_owner: "tbd"
//! ---
//! Context-enriched logging macros.

/// Emit an informational log enriched with simulated-user context.
#[macro_export]
macro_rules! kl_info {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::INFO,
            scenario = ctx.scenario.unwrap_or(""),
            user = ctx.user.unwrap_or_default(),
            queue_id = ctx.queue_id.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        $crate::kl_info!(context = $crate::LogContext::default(), $($arg)+)
    }};
}

/// Emit a debug log enriched with simulated-user context.
#[macro_export]
macro_rules! kl_debug {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::DEBUG,
            scenario = ctx.scenario.unwrap_or(""),
            user = ctx.user.unwrap_or_default(),
            queue_id = ctx.queue_id.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        $crate::kl_debug!(context = $crate::LogContext::default(), $($arg)+)
    }};
}

/// Emit a warning enriched with simulated-user context.
#[macro_export]
macro_rules! kl_warn {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::WARN,
            scenario = ctx.scenario.unwrap_or(""),
            user = ctx.user.unwrap_or_default(),
            queue_id = ctx.queue_id.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        $crate::kl_warn!(context = $crate::LogContext::default(), $($arg)+)
    }};
}
