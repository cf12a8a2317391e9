use std::io::{Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xpanel-ctl")]
#[command(about = "Send navigator input to a running xpanel daemon")]
#[command(version)]
struct Cli {
    /// Daemon socket (defaults to $XDG_RUNTIME_DIR/xpanel.sock)
    #[arg(long)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Press the OK button of a navigator
    Ok {
        /// Navigator side (left, right)
        side: String,
    },
    /// Press the back button of a navigator
    Back {
        /// Navigator side
        side: String,
    },
    /// Report a raw wheel reading
    Wheel {
        /// Navigator side
        side: String,
        /// Raw wheel value
        #[arg(allow_hyphen_values = true)]
        value: i32,
    },
    /// Scroll one step
    Scroll {
        /// Navigator side
        side: String,
        /// forward or backward
        direction: String,
    },
    /// Retry enabling the robot
    Enable,
    /// Show an error window (stopped, no_enable, calib_error)
    Error {
        /// Error kind
        kind: String,
    },
    /// Show the active window
    Status,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cmd = match cli.command {
        Command::Ok { side } => format!("ok {}", side),
        Command::Back { side } => format!("back {}", side),
        Command::Wheel { side, value } => format!("wheel {} {}", side, value),
        Command::Scroll { side, direction } => format!("scroll {} {}", side, direction),
        Command::Enable => "enable".to_string(),
        Command::Error { kind } => format!("error {}", kind),
        Command::Status => "status".to_string(),
    };

    let path = cli.socket.unwrap_or_else(socket_path);
    let response = send_command(&path, &cmd)?;
    let response = response.trim();
    println!("{}", response);

    if response.starts_with("error") {
        std::process::exit(1);
    }
    Ok(())
}

/// Get the daemon socket path
fn socket_path() -> PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir());
    runtime_dir.join("xpanel.sock")
}

/// Send one line to the daemon and read its reply
fn send_command(path: &PathBuf, cmd: &str) -> anyhow::Result<String> {
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "xpanel daemon is not running (socket not found at {:?})",
            path
        ));
    }

    let mut stream = UnixStream::connect(path)?;
    stream.write_all(cmd.as_bytes())?;
    stream.write_all(b"\n")?;
    stream.flush()?;
    stream.shutdown(Shutdown::Write)?;

    let mut response = String::new();
    stream.read_to_string(&mut response)?;

    Ok(response)
}
