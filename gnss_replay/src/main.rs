use std::{
    fs::File,
    io::{self, Read, Write},
    path::PathBuf,
    time::Duration,
};

use anyhow::Context;
use clap::Parser;
use gnss_stream::{
    CustomInit, JavadConfig, Observation, ParserSelection, SensorPose, Session, SessionConfig,
};
use log::{debug, info};

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Receiver log to replay
    #[arg(short, long, required_unless_present = "port", conflicts_with = "port")]
    file: Option<PathBuf>,

    /// Serial port device
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long, default_value_t = 9600)]
    baud: u32,

    /// NMEA or NOVATEL_OEM6
    #[arg(long, default_value = "NMEA")]
    parser: ParserSelection,

    /// Vendor start-up commands: JAVAD or TopCon
    #[arg(long)]
    custom_init: Option<CustomInit>,

    /// Receiver port RTK corrections come in on (Javad only)
    #[arg(long)]
    rtk_src_port: Option<String>,

    /// Baud rate of the RTK source port, 0 leaves it alone (Javad only)
    #[arg(long, default_value_t = 0)]
    rtk_src_baud: u32,

    /// RTK correction format (Javad only)
    #[arg(long, default_value = "cmr")]
    rtk_format: String,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pose_x: f64,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pose_y: f64,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pose_z: f64,

    /// Copy every byte read to <PREFIX>_<YYYYMMDD_HHMMSS>.gps
    #[arg(long)]
    raw_dump_prefix: Option<String>,

    /// Bytes read per poll
    #[arg(long, default_value_t = 512)]
    chunk_size: usize,

    /// Put the receiver into advanced input mode after start-up
    #[arg(long)]
    aim: bool,

    /// Print observations and statistics as JSON lines
    #[arg(long)]
    json: bool,

    /// Log every decoded frame
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            parser: self.parser,
            sensor_pose: SensorPose {
                x: self.pose_x,
                y: self.pose_y,
                z: self.pose_z,
            },
            raw_dump_file_prefix: self.raw_dump_prefix.clone(),
            custom_init: self.custom_init.unwrap_or_default(),
            javad: JavadConfig {
                rtk_src_port: self.rtk_src_port.clone(),
                rtk_src_baud: self.rtk_src_baud,
                rtk_format: self.rtk_format.clone(),
                use_aim_mode: self.aim,
                ..Default::default()
            },
            verbose: self.verbose,
            ..Default::default()
        }
    }
}

enum Source {
    File(File),
    Port(Box<dyn serialport::SerialPort>),
}

impl Source {
    fn open(args: &Args) -> anyhow::Result<Self> {
        if let Some(path) = &args.file {
            let file =
                File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
            return Ok(Source::File(file));
        }
        let name = args
            .port
            .as_deref()
            .context("either --file or --port is required")?;
        let port = serialport::new(name, args.baud)
            .timeout(Duration::from_millis(100))
            .open()
            .with_context(|| format!("cannot open serial port {name}"))?;
        info!("serial port '{name}' opened at {} baud", args.baud);
        Ok(Source::Port(port))
    }

    /// `Ok(None)` marks the end of a replayed file. Serial timeouts read as zero bytes.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self {
            Source::File(file) => match file.read(buf)? {
                0 => Ok(None),
                n => Ok(Some(n)),
            },
            Source::Port(port) => match port.read(buf) {
                Ok(n) => Ok(Some(n)),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Some(0)),
                Err(e) => Err(e),
            },
        }
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        match self {
            Source::File(_) => {
                debug!("file replay, not sending {} command bytes", data.len());
                Ok(())
            },
            Source::Port(port) => port.write_all(data),
        }
    }
}

fn open_dump(prefix: Option<&str>) -> anyhow::Result<Option<File>> {
    let Some(prefix) = prefix else {
        return Ok(None);
    };
    let name = format!(
        "{prefix}_{}.gps",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let file = File::create(&name).with_context(|| format!("cannot create raw dump {name}"))?;
    info!("writing raw dump to {name}");
    Ok(Some(file))
}

fn print_observation(obs: &Observation, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(obs)?);
        return Ok(());
    }
    let stamp = obs
        .timestamp()
        .map(|t| t.to_string())
        .or_else(|| obs.time.map(|t| t.to_string()))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{stamp} lat {:.7} lon {:.7} alt {} fix {:?} sats {} speed {}",
        obs.latitude.unwrap_or_default(),
        obs.longitude.unwrap_or_default(),
        obs.altitude.map_or("-".to_string(), |a| format!("{a:.2}")),
        obs.fix_quality.unwrap_or_default(),
        obs.satellites.map_or("-".to_string(), |s| s.to_string()),
        obs.ground_speed.map_or("-".to_string(), |s| format!("{s:.2}")),
    );
    Ok(())
}

/// Polls until the session has caught up with the pushed bytes. Returns
/// whether any observation came out.
fn drain(session: &mut Session, source: &mut Source, json: bool) -> anyhow::Result<bool> {
    let mut emitted = false;
    loop {
        let poll = session.poll();
        source.write_all(&poll.outgoing)?;
        if let Some(obs) = &poll.observation {
            print_observation(obs, json)?;
            emitted = true;
        }
        if !poll.backlog {
            return Ok(emitted);
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .format_timestamp(None)
        .format_target(false)
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_env("RUST_LOG")
        .init();

    let mut session = Session::new(args.session_config()).context("invalid configuration")?;
    let mut source = Source::open(&args)?;
    let mut dump = open_dump(args.raw_dump_prefix.as_deref())?;

    let mut buf = vec![0u8; args.chunk_size.max(1)];
    loop {
        let n = match source.read(&mut buf) {
            Ok(Some(n)) => n,
            Ok(None) => break,
            Err(e) => {
                session.transport_failed();
                let _ = source.write_all(&session.take_outgoing());
                return Err(e).context("read failed");
            },
        };
        if let Some(dump) = dump.as_mut() {
            dump.write_all(&buf[..n])?;
        }
        session.push_bytes(&buf[..n]);
        drain(&mut session, &mut source, args.json)?;
    }

    // end of file: quiet polls let the last observation out
    while drain(&mut session, &mut source, args.json)? {}

    if args.json {
        println!("{}", serde_json::to_string(session.stats())?);
    } else {
        println!("{:#?}", session.stats());
    }
    let goodbye = session.shutdown();
    source.write_all(&goodbye)?;
    Ok(())
}
