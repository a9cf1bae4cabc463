use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the indigo-upload tool.
///
/// Every subcommand except `init-config` opens one SFTP session, performs a
/// single operation and disconnects.
#[derive(Parser, Debug)]
#[clap(name = "indigo-upload", about = "Store, fetch and delete files on an SFTP file store")]
pub struct Args {
    /// Path to configuration YAML file
    #[clap(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Print results as a JSON response envelope
    #[clap(long, global = true)]
    pub json: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a local file under a logical path
    Store {
        /// Local file to upload
        file: PathBuf,

        /// Logical path (subdirectory under the base path)
        #[clap(short, long, default_value = "")]
        path: String,

        /// Remote file name (defaults to the local file name)
        #[clap(short, long)]
        name: Option<String>,
    },

    /// Download a previously stored file
    Fetch {
        /// Relative path returned by `store`
        relative_path: String,

        /// Where to write the file (default: stdout)
        #[clap(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete a previously stored file
    Delete {
        /// Relative path returned by `store`
        relative_path: String,
    },

    /// Write a template configuration file
    InitConfig {
        /// Path to write the configuration file
        #[clap(default_value = "indigo-upload.yaml")]
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_store() {
        let args = Args::parse_from([
            "indigo-upload",
            "--config",
            "upload.yaml",
            "store",
            "/tmp/a.jpg",
            "--path",
            "avatars",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("upload.yaml")));
        match args.command {
            Commands::Store { file, path, name } => {
                assert_eq!(file, PathBuf::from("/tmp/a.jpg"));
                assert_eq!(path, "avatars");
                assert!(name.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_delete_with_global_flags_after_subcommand() {
        let args = Args::parse_from(["indigo-upload", "delete", "docs/20240101/r.pdf", "-v", "--json"]);
        assert!(args.verbose);
        assert!(args.json);
        assert!(matches!(args.command, Commands::Delete { .. }));
    }

    #[test]
    fn test_init_config_default_path() {
        let args = Args::parse_from(["indigo-upload", "init-config"]);
        match args.command {
            Commands::InitConfig { path } => assert_eq!(path, PathBuf::from("indigo-upload.yaml")),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
