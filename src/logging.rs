//! Logging bootstrap.
//!
//! Console output plus a size-rotating log file under `~/.stride_studio/`.
//! Re-invocations are no-ops; the first call wins.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Once;

use log::LevelFilter;

/// Log file cap before rotation.
const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;
/// Rotated backups kept: stride_studio.log.1 .. .5
const LOG_BACKUPS: usize = 5;

static INIT: Once = Once::new();

/// Directory holding the log file and app config.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".stride_studio")
}

/// Path of the active log file.
pub fn log_path() -> PathBuf {
    app_data_dir().join("stride_studio.log")
}

/// Initialise logging once: console + rotating file, level from
/// `STRIDE_LOG` (default `info`).
pub fn init(level: LevelFilter) {
    INIT.call_once(|| {
        let dir = app_data_dir();
        let file = fs::create_dir_all(&dir)
            .and_then(|_| RotatingFile::open(log_path(), MAX_LOG_BYTES, LOG_BACKUPS));

        let mut builder = env_logger::Builder::from_env(
            env_logger::Env::new().filter_or("STRIDE_LOG", level.to_string()),
        );
        builder.format(|buf, record| {
            writeln!(
                buf,
                "{}  {:<5}  {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        });

        match file {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(Tee::new(file))));
            }
            Err(e) => {
                eprintln!("stride-studio: file logging disabled: {}", e);
            }
        }

        let _ = builder.try_init();
        log::info!("Logger initialised - log file: {}", log_path().display());
    });
}

/// Writer that duplicates everything to stderr and the rotating file.
struct Tee {
    file: RotatingFile,
}

impl Tee {
    fn new(file: RotatingFile) -> Self {
        Self { file }
    }
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _ = io::stderr().write_all(buf);
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stderr().flush();
        self.file.flush()
    }
}

/// Append-only file that rolls to numbered backups at a byte cap.
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backups: usize,
    file: File,
    written: u64,
}

impl RotatingFile {
    pub fn open(path: PathBuf, max_bytes: u64, backups: usize) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            path,
            max_bytes,
            backups,
            file,
            written,
        })
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    /// Shift `log.N-1` -> `log.N`, then `log` -> `log.1`, then reopen.
    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let _ = fs::remove_file(self.backup_path(self.backups));
        for i in (1..self.backups).rev() {
            let from = self.backup_path(i);
            if from.exists() {
                let _ = fs::rename(&from, self.backup_path(i + 1));
            }
        }
        let _ = fs::rename(&self.path, self.backup_path(1));
        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
