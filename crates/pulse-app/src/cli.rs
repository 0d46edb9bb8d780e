use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pulse", about = "Pulse fleet-monitoring request-serving core", version)]
pub struct Args {
	#[command(subcommand)]
	pub command: Option<Command>,

	/// Path to the YAML config file.
	#[arg(long, env = "PULSE_CONFIG", default_value = "pulse.yaml")]
	pub config: PathBuf,

	/// Address to bind the HTTP listener to.
	#[arg(long, env = "PULSE_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
	pub listen_addr: String,

	/// Address to bind the admin (health/metrics) listener to.
	#[arg(long, env = "PULSE_ADMIN_ADDR", default_value = "127.0.0.1:9090")]
	pub admin_addr: String,
}

#[derive(Subcommand)]
pub enum Command {
	/// Run the server in the foreground (default when no subcommand is given).
	Serve,
	/// Validate the config file and exit without binding a listener.
	CheckConfig,
}
