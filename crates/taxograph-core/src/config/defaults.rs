//! Default values for Taxograph configuration.
//!
//! All hardcoded defaults are centralized here for easy maintenance.

// ============================================================================
// Config File Locations
// ============================================================================

/// Project-local config file name.
pub const DEFAULT_CONFIG_FILE: &str = "taxograph.toml";

/// Directory under the user config dir holding `config.toml`.
pub const DEFAULT_CONFIG_DIR: &str = "taxograph";

// ============================================================================
// Database Defaults
// ============================================================================

/// Default SQLite database path.
pub const DEFAULT_DB_PATH: &str = "taxograph.db";

// ============================================================================
// Logging Defaults
// ============================================================================

/// Default log filter directive.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// ============================================================================
// Export Defaults
// ============================================================================

/// Default directory for Gephi CSV exports.
pub const DEFAULT_EXPORT_DIR: &str = "gephi";

/// Node table file name.
pub const DEFAULT_NODES_FILE: &str = "nodes.csv";

/// Edge table file name.
pub const DEFAULT_EDGES_FILE: &str = "edges.csv";

// ============================================================================
// Server Defaults
// ============================================================================

/// Default bind address for the viewer API.
pub const DEFAULT_SERVE_HOST: &str = "127.0.0.1";

/// Default port for the viewer API.
pub const DEFAULT_SERVE_PORT: u16 = 3344;
