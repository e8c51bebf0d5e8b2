//! smolctl - inspect and edit smoldb store files

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use smoldb::{Encoder, Key, Node, Options, Scalar, Store, Token, Tokenizer};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Store file
    #[arg(short, long, default_value = "smol.db")]
    file: PathBuf,

    /// Keys are integers written bare instead of quoted strings
    #[arg(long)]
    numeric_keys: bool,

    /// Skip fsync after writes
    #[arg(long)]
    no_sync: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the value stored under KEY
    Get { key: String },

    /// Store VALUE under KEY, as a quoted string unless --bare is given
    Set {
        key: String,
        value: String,

        /// Store VALUE as a bare token (number, true/false, ~, [] or {})
        #[arg(long)]
        bare: bool,
    },

    /// Remove KEY
    Del { key: String },

    /// List all keys
    Keys,

    /// Print the number of entries
    Size,

    /// Print the whole store in canonical form
    Dump,

    /// Rewrite the file without tombstones
    Compact,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let args = Args::parse();
    let options = Options::new().sync(!args.no_sync);
    debug!(file = %args.file.display(), numeric_keys = args.numeric_keys, "opening store");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.numeric_keys {
        let store = open::<i64>(&args, options)?;
        run(&store, args.command, &mut out)
    } else {
        let store = open::<String>(&args, options)?;
        run(&store, args.command, &mut out)
    }
}

fn open<K>(args: &Args, options: Options) -> Result<Store<K, Node>>
where
    K: Key + Send + Sync + 'static,
{
    Store::open_with(&args.file, options)
        .with_context(|| format!("Failed to open store {}", args.file.display()))
}

fn run<K, W>(store: &Store<K, Node>, command: Command, out: &mut W) -> Result<()>
where
    K: Key + Send + Sync + 'static,
    W: Write,
{
    match command {
        Command::Get { key } => {
            let key = parse_key::<K>(&key)?;
            let value = store
                .try_get(&key)
                .context("Failed to read store")?
                .with_context(|| format!("No such key: {}", key.to_scalar()))?;
            Encoder::new(&mut *out).encode_node(&value)?;
        }
        Command::Set { key, value, bare } => {
            let key = parse_key::<K>(&key)?;
            let value = if bare {
                parse_bare(&value)?
            } else {
                Node::Scalar(Scalar::Str(value))
            };
            store.set(key, value).context("Failed to write store")?;
        }
        Command::Del { key } => {
            let key = parse_key::<K>(&key)?;
            store.del(&key).context("Failed to write store")?;
        }
        Command::Keys => {
            for key in store.keys() {
                writeln!(out, "{}", key.to_scalar())?;
            }
        }
        Command::Size => {
            writeln!(out, "{}", store.size())?;
        }
        Command::Dump => {
            let mut encoder = Encoder::new(&mut *out);
            for key in store.keys() {
                if let Some(value) = store.try_get(&key)? {
                    encoder.encode_entry(&key, &value)?;
                }
            }
        }
        Command::Compact => {
            store.save().context("Failed to rewrite store")?;
        }
    }
    out.flush()?;
    Ok(())
}

fn parse_key<K: Key>(text: &str) -> Result<K> {
    match K::parse(text) {
        Some(key) => Ok(key),
        None => bail!("Invalid key {:?}: expected an integer", text),
    }
}

/// Accepts exactly one bare token.
fn parse_bare(text: &str) -> Result<Node> {
    let tokens: Vec<Token<'_>> = Tokenizer::new(text)
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Invalid bare value {:?}", text))?;
    match tokens.as_slice() {
        [Token::Indent(0), Token::Bare(bare)] => Node::from_bare(bare).with_context(|| {
            format!("Invalid bare value {:?}: expected a number, true, false, ~, [] or {{}}", text)
        }),
        _ => bail!("Invalid bare value {:?}: expected a single unquoted token", text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn output<K: Key + Send + Sync + 'static>(store: &Store<K, Node>, command: Command) -> String {
        let mut out = Vec::new();
        run(store, command, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_bare() {
        assert_eq!(parse_bare("42").unwrap(), Node::Scalar(Scalar::Int(42)));
        assert_eq!(parse_bare("0.5").unwrap(), Node::Scalar(Scalar::Float(0.5)));
        assert_eq!(parse_bare("~").unwrap(), Node::null());
        assert_eq!(parse_bare("[]").unwrap(), Node::Seq(vec![]));
        assert!(parse_bare("yes").is_err());
        assert!(parse_bare("two words").is_err());
        assert!(parse_bare("\"quoted\"").is_err());
        assert!(parse_bare("a:").is_err());
        assert!(parse_bare("").is_err());
    }

    #[test]
    fn test_string_keys() {
        let dir = TempDir::new().unwrap();
        let store: Store<String, Node> = Store::open(dir.path().join("db")).unwrap();

        let set = |key: &str, value: &str, bare| Command::Set {
            key: key.to_string(),
            value: value.to_string(),
            bare,
        };
        output(&store, set("name", "smol db", false));
        output(&store, set("port", "8080", true));

        assert_eq!(output(&store, Command::Get { key: "name".to_string() }), "\"smol db\"\n");
        assert_eq!(output(&store, Command::Get { key: "port".to_string() }), "8080\n");
        assert_eq!(output(&store, Command::Keys), "\"name\"\n\"port\"\n");
        assert_eq!(output(&store, Command::Dump), "\"name\": \"smol db\"\n\"port\": 8080\n");

        output(&store, Command::Del { key: "name".to_string() });
        assert_eq!(output(&store, Command::Size), "1\n");
        let mut sink = Vec::new();
        assert!(run(&store, Command::Get { key: "name".to_string() }, &mut sink).is_err());
    }

    #[test]
    fn test_numeric_keys() {
        let dir = TempDir::new().unwrap();
        let store: Store<i64, Node> = Store::open(dir.path().join("db")).unwrap();

        output(&store, Command::Set { key: "-3".to_string(), value: "x".to_string(), bare: false });
        assert_eq!(output(&store, Command::Keys), "-3\n");

        let mut sink = Vec::new();
        let err = run(&store, Command::Del { key: "abc".to_string() }, &mut sink).unwrap_err();
        assert!(err.to_string().contains("expected an integer"));
    }

    #[test]
    fn test_compact_removes_tombstones() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db");
        let store: Store<i64, Node> = Store::open(&path).unwrap();
        for key in 0..5 {
            output(&store, Command::Set { key: key.to_string(), value: "v".to_string(), bare: false });
        }
        output(&store, Command::Del { key: "2".to_string() });
        assert!(std::fs::read_to_string(&path).unwrap().contains("\n\n"));

        output(&store, Command::Compact);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0: \"v\"\n1: \"v\"\n3: \"v\"\n4: \"v\"\n");
    }
}
