//! User-Friendly Error Formatting
//!
//! Startup failures are printed with troubleshooting hints for the common
//! cases: unreadable input devices, inotify limits and bad configuration.

use std::fmt::Write;

/// Format error for user consumption
///
/// Takes technical error and produces user-friendly message with
/// troubleshooting steps and context.
pub fn format_user_error(error: &anyhow::Error) -> String {
    let mut output = String::new();

    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "╔════════════════════════════════════════════════════════════╗"
    )
    .ok();
    writeln!(
        &mut output,
        "║                     ERROR                                  ║"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();
    writeln!(&mut output).ok();

    // Include the whole context chain when classifying
    let error_msg = format!("{:#}", error);

    if error_msg.contains("inotify") {
        format_inotify_error(&mut output);
    } else if error_msg.contains("watch") || error_msg.contains("/dev/input") {
        format_input_dir_error(&mut output);
    } else if error_msg.contains("config") {
        format_config_error(&mut output);
    } else {
        format_generic_error(&mut output);
    }

    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Technical Details:").ok();
    writeln!(&mut output).ok();
    writeln!(&mut output, "{}", error_msg).ok();
    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(
        &mut output,
        "Run with -vv for detailed logs: bt-page-turner -vv"
    )
    .ok();

    output
}

fn format_inotify_error(output: &mut String) {
    writeln!(output, "Hot-Plug Watch Error").ok();
    writeln!(output).ok();
    writeln!(output, "Could not set up inotify to detect new devices.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Too many inotify instances or watches").ok();
    writeln!(output, "     → Check: cat /proc/sys/fs/inotify/max_user_instances").ok();
    writeln!(output, "     → Raise: sysctl fs.inotify.max_user_instances=256").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Kernel built without inotify support").ok();
}

fn format_input_dir_error(output: &mut String) {
    writeln!(output, "Input Device Directory Error").ok();
    writeln!(output).ok();
    writeln!(output, "Could not watch the input device directory.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Directory does not exist").ok();
    writeln!(output, "     → Check device_dir in config.toml (default /dev/input)").ok();
    writeln!(output).ok();
    writeln!(output, "  2. No permission to read input devices").ok();
    writeln!(output, "     → Run as root, or add the user to the input group:").ok();
    writeln!(output, "       sudo usermod -aG input $USER").ok();
}

fn format_config_error(output: &mut String) {
    writeln!(output, "Configuration Error").ok();
    writeln!(output).ok();
    writeln!(output, "Problem with configuration file.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. TOML syntax error").ok();
    writeln!(output, "     → Sections are [paths], [dispatch] and [logging]").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Invalid value").ok();
    writeln!(output, "     → poll_interval_ms must be 1..=65535").ok();
    writeln!(output, "     → heartbeat_idle_secs must be greater than 0").ok();
    writeln!(output, "     → level must be trace, debug, info, warn or error").ok();
}

fn format_generic_error(output: &mut String) {
    writeln!(output, "Startup Error").ok();
    writeln!(output).ok();
    writeln!(output, "The page turner could not start.").ok();
}
