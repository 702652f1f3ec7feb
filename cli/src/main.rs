use clap::{Parser, Subcommand};
use hound::{SampleFormat, WavSpec};
use std::path::PathBuf;

use soundlink_core::framing::bit_string;
use soundlink_core::{Demodulator, LinkError, MemorySink, MemorySource, Modulator, SAMPLE_RATE};

#[derive(Parser)]
#[command(name = "soundlink")]
#[command(about = "Ethernet-style frames over FSK audio tones")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a message and transmit it into a WAV file
    Send {
        /// Address of the sender
        #[arg(long, default_value_t = 0)]
        source: u64,

        /// Address of the recipient
        #[arg(long, default_value_t = 1)]
        destination: u64,

        /// Message to be sent
        #[arg(long, default_value = "hello world")]
        message: String,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,
    },

    /// Listen for frames in a WAV file and decode them
    Listen {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Keep listening for further frames after each decode
        #[arg(long)]
        continuous: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stdout)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Send {
            source,
            destination,
            message,
            output,
        } => send_command(source, destination, &message, &output),
        Commands::Listen { input, continuous } => listen_command(&input, continuous),
    }
}

fn send_command(
    source: u64,
    destination: u64,
    message: &str,
    output: &PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("I am sending message {message} to {destination} from {source}.");

    let bits = soundlink_core::encode(source, destination, message)?;
    println!("Encoded bits {}", bit_string(&bits));

    let mut sink = MemorySink::new();
    Modulator::default().transmit(&bits, &mut sink)?;
    let samples = sink.into_samples();
    log::debug!("modulated {} samples", samples.len());

    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE as u32,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(output, spec)?;
    for sample in samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * 32767.0) as i16)?;
    }
    writer.finalize()?;

    println!("Wrote {}", output.display());
    Ok(())
}

fn listen_command(input: &PathBuf, continuous: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = hound::WavReader::open(input)?;
    let spec = reader.spec();
    log::debug!(
        "input WAV: {} Hz, {} channels, {} bits",
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .collect::<Result<Vec<i16>, _>>()?
            .into_iter()
            .map(|s| s as f32 / 32768.0)
            .collect(),
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<Vec<f32>, _>>()?,
        _ => {
            return Err(format!(
                "unsupported WAV format: {} bits {:?}",
                spec.bits_per_sample, spec.sample_format
            )
            .into());
        }
    };

    let mut source = MemorySource::new(samples);
    loop {
        // Fresh demodulator per cycle; no receiver state carries over
        match Demodulator::default().listen(&mut source) {
            Ok(frame) => println!("{} {} {}", frame.source, frame.destination, frame.payload),
            Err(LinkError::NoCarrier) => {
                log::info!("No more frames in input");
                break;
            }
            Err(e) => println!("Failed to decode frame: {e}"),
        }
        if !continuous {
            break;
        }
    }
    Ok(())
}
