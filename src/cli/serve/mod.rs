//! HTTP API lifecycle: start the identify server in the foreground or as a
//! daemon, stop it, and report its status.

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use daemonize::Daemonize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

mod server;
pub mod types;

pub use server::IdentifyServer;

use crate::db::Database;

/// Default port for the identify API.
const DEFAULT_PORT: u16 = 3000;

#[derive(Args)]
pub struct ServeArgs {
    #[command(subcommand)]
    pub command: ServeCommands,
}

#[derive(Subcommand)]
pub enum ServeCommands {
    /// Start the API server
    Start {
        /// Port to listen on (default: 3000)
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Run in foreground (don't daemonize)
        #[arg(short, long)]
        foreground: bool,
    },
    /// Stop the API server
    Stop,
    /// Show API server status
    Status,
}

/// Run the serve command.
pub fn run_serve(db: &Database, args: ServeArgs) -> Result<()> {
    match args.command {
        ServeCommands::Start { port, foreground } => start_server(db, port, foreground),
        ServeCommands::Stop => stop_server(),
        ServeCommands::Status => show_status(db),
    }
}

/// Start the API server.
fn start_server(db: &Database, port: u16, foreground: bool) -> Result<()> {
    // Check if already running
    if let Some(pid) = read_pid_file()? {
        if is_process_running(pid) {
            return Err(anyhow!("Server already running (PID {})", pid));
        }
        // Stale PID file, remove it
        remove_pid_file()?;
    }

    if foreground {
        write_pid_file(std::process::id())?;

        let server = IdentifyServer::new(port, db)?;
        let shutdown = Arc::new(AtomicBool::new(false));
        ctrlc_handler(shutdown.clone());

        println!("Starting identify API on port {}...", port);
        println!("Press Ctrl+C to stop");

        let result = server.start(shutdown);
        remove_pid_file()?;
        match result {
            Ok(()) => println!("Server stopped"),
            Err(e) => return Err(e),
        }
    } else {
        let pid_path = pid_file_path()?;
        let log_path = log_file_path()?;

        if let Some(parent) = pid_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        // Print startup message before daemonizing (parent exits after fork)
        println!("Starting identify API daemon on port {}...", port);
        println!("Log file: {}", log_path.display());
        println!("Stop with: idlink serve stop");

        let daemonize = Daemonize::new()
            .pid_file(&pid_path)
            .chown_pid_file(true)
            .working_directory(".")
            .stdout(log_file.try_clone()?)
            .stderr(log_file);

        match daemonize.start() {
            Ok(_) => {
                // Now in the daemon process
                log_line(&log_path, &format!("Daemon started on port {}", port));

                let server = IdentifyServer::new(port, db)?;
                let shutdown = Arc::new(AtomicBool::new(false));
                ctrlc_handler(shutdown.clone());

                match server.start(shutdown) {
                    Ok(()) => log_line(&log_path, "Daemon stopped"),
                    Err(e) => log_line(&log_path, &format!("Daemon error: {}", e)),
                }
            }
            Err(e) => {
                return Err(anyhow!("Failed to daemonize: {}", e));
            }
        }
    }

    Ok(())
}

/// Stop the API server.
fn stop_server() -> Result<()> {
    match read_pid_file()? {
        Some(pid) => {
            if is_process_running(pid) {
                #[cfg(unix)]
                unsafe {
                    libc::kill(pid as i32, libc::SIGTERM);
                }
                println!("Sent stop signal to server (PID {})", pid);

                std::thread::sleep(std::time::Duration::from_millis(500));

                if !is_process_running(pid) {
                    remove_pid_file()?;
                    println!("Server stopped");
                } else {
                    println!("Server still running, may take a moment to stop");
                }
            } else {
                remove_pid_file()?;
                println!("Server was not running (stale PID file removed)");
            }
        }
        None => {
            println!("Server is not running");
        }
    }
    Ok(())
}

/// Show API server status plus store statistics.
fn show_status(db: &Database) -> Result<()> {
    println!("Identify API Status");
    println!("───────────────────");

    match read_pid_file()? {
        Some(pid) if is_process_running(pid) => {
            println!("Status:      Running (PID {})", pid);
            if let Ok(log_path) = log_file_path() {
                if log_path.exists() {
                    println!("Log file:    {}", log_path.display());
                }
            }
        }
        Some(_) => {
            println!("Status:      Stopped (stale PID file)");
        }
        None => {
            println!("Status:      Stopped");
        }
    }

    let stats = db.contact_stats()?;
    println!("Contacts:    {}", stats.total);
    println!("Primaries:   {}", stats.primaries);
    println!("Secondaries: {}", stats.secondaries);

    Ok(())
}

fn log_line(log_path: &PathBuf, message: &str) {
    if let Ok(mut f) = OpenOptions::new().append(true).open(log_path) {
        let _ = writeln!(
            f,
            "[{}] {}",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
            message
        );
    }
}

// ========== PID File Management ==========

fn pid_file_path() -> Result<PathBuf> {
    let config_dir =
        dirs::config_dir().ok_or_else(|| anyhow!("Could not find config directory"))?;
    Ok(config_dir.join("idlink").join("serve.pid"))
}

fn log_file_path() -> Result<PathBuf> {
    let config_dir =
        dirs::config_dir().ok_or_else(|| anyhow!("Could not find config directory"))?;
    Ok(config_dir.join("idlink").join("serve.log"))
}

fn write_pid_file(pid: u32) -> Result<()> {
    let path = pid_file_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, pid.to_string())?;
    Ok(())
}

fn read_pid_file() -> Result<Option<u32>> {
    let path = pid_file_path()?;
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)?;
    match content.trim().parse() {
        Ok(pid) => Ok(Some(pid)),
        Err(_) => Ok(None),
    }
}

fn remove_pid_file() -> Result<()> {
    let path = pid_file_path()?;
    if path.exists() {
        fs::remove_file(&path)?;
    }
    Ok(())
}

fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::kill(pid as i32, 0) == 0 }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

fn ctrlc_handler(shutdown: Arc<AtomicBool>) {
    let _ = ctrlc::set_handler(move || {
        println!("\nReceived Ctrl+C, shutting down...");
        shutdown.store(true, Ordering::SeqCst);
    });
}
