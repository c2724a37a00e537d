// Release builds on Windows run without a console window (launch on login).
#![cfg_attr(
    all(target_os = "windows", not(debug_assertions)),
    windows_subsystem = "windows"
)]

use clap::Parser;

fn main() {
    #[cfg(target_os = "windows")]
    attach_parent_console();

    let cli = ai_assistant_lib::cli::Cli::parse();
    if let Err(e) = ai_assistant_lib::run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Borrow the console of the shell that started us, so CLI output still
/// shows in a windowless build. Does nothing when started from the Run key.
#[cfg(target_os = "windows")]
fn attach_parent_console() {
    use windows::Win32::System::Console::{AttachConsole, ATTACH_PARENT_PROCESS};
    unsafe {
        let _ = AttachConsole(ATTACH_PARENT_PROCESS);
    }
}
