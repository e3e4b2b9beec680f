//! SDMX Geo CLI - Decode SDMX-JSON and join it to boundaries
//!
//! # Main Commands
//!
//! ```bash
//! sdmxgeo serve                                   # Start HTTP server (port 3000)
//! sdmxgeo decode data.json -o layer.geojson       # SDMX-JSON or CSV to GeoJSON
//! sdmxgeo join --sdmx data.json --geometry countries.geojson \
//!     --geo-field ISO3 --sdmx-field REF_AREA_CODE  # Attach boundaries
//! ```
//!
//! # Helper Commands
//!
//! ```bash
//! sdmxgeo inspect data.json                       # Observation count and fields
//! sdmxgeo fetch <sdmx-rest-url>                   # Fetch and decode from an API
//! sdmxgeo fetch --xml <sdmx-rest-url>             # Summarize an SDMX-ML response
//! sdmxgeo fields <feature-service-url>            # List boundary layer fields
//! sdmxgeo where data.json --geo-field ISO3 --sdmx-field REF_AREA_CODE
//! sdmxgeo dataflows structure.json                # List dataflows
//! ```

use clap::{Parser, Subcommand};
use sdmxgeo::{
    decode_file, decode_url, join_decoded, join_with_feature_service, list_dataflows,
    load_geometry_file, summarize, summarize_xml, summarize_xml_url, where_clause,
    FeatureServiceClient, JoinSpec, PayloadSummary, SdmxClient, Settings, SourceFormat,
};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sdmxgeo")]
#[command(about = "Decode SDMX-JSON into GeoJSON and join it to boundaries", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode an SDMX-JSON or CSV file into a GeoJSON layer
    Decode {
        /// Input file
        input: PathBuf,

        /// Input format
        #[arg(short, long, value_enum, default_value_t = SourceFormat::Auto)]
        format: SourceFormat,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode a file and attach geometry from a GeoJSON file or a feature service
    Join {
        /// SDMX-JSON or CSV file
        #[arg(long)]
        sdmx: PathBuf,

        /// GeoJSON FeatureCollection with the boundaries
        #[arg(long, required_unless_present = "feature_service", conflicts_with = "feature_service")]
        geometry: Option<PathBuf>,

        /// Feature service layer URL to query for boundaries
        #[arg(long)]
        feature_service: Option<String>,

        /// Boundary field to match on
        #[arg(long)]
        geo_field: String,

        /// Record field to match on
        #[arg(long)]
        sdmx_field: String,

        /// Prefix prepended to boundary values
        #[arg(long)]
        geo_prefix: Option<String>,

        /// Prefix prepended to record values
        #[arg(long)]
        sdmx_prefix: Option<String>,

        /// Feature service token (overrides SDMXGEO_FEATURE_SERVICE_TOKEN)
        #[arg(long)]
        token: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show observation count and fields without writing records
    Inspect {
        /// Input SDMX-JSON or SDMX-ML (GenericData) file
        input: PathBuf,
    },

    /// Fetch an SDMX-JSON payload from a REST endpoint and decode it
    Fetch {
        /// SDMX REST data URL
        url: String,

        /// Write the payload as received instead of decoding it
        #[arg(long)]
        raw: bool,

        /// Request SDMX-ML (GenericData) and print its observation count and fields
        #[arg(long)]
        xml: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the feature service filter selecting the boundaries a file references
    Where {
        /// SDMX-JSON or CSV file
        input: PathBuf,

        #[arg(long)]
        geo_field: String,

        #[arg(long)]
        sdmx_field: String,
    },

    /// List the fields of a feature service layer
    Fields {
        /// Feature service layer URL
        url: String,

        /// Feature service token (overrides SDMXGEO_FEATURE_SERVICE_TOKEN)
        #[arg(long)]
        token: Option<String>,
    },

    /// List the dataflows of an SDMX-JSON structure message
    Dataflows {
        /// Structure message file
        input: PathBuf,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: SDMXGEO_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    let settings = Settings::from_env();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Decode {
            input,
            format,
            output,
        } => cmd_decode(&input, format, output.as_deref()).await,

        Commands::Join {
            sdmx,
            geometry,
            feature_service,
            geo_field,
            sdmx_field,
            geo_prefix,
            sdmx_prefix,
            token,
            output,
        } => {
            let spec = JoinSpec::new(geo_field, geo_prefix, sdmx_field, sdmx_prefix);
            let source = match (geometry, feature_service) {
                (Some(path), _) => GeometrySource::File(path),
                (None, Some(url)) => GeometrySource::Service(url),
                (None, None) => {
                    eprintln!("❌ Error: --geometry or --feature-service is required");
                    std::process::exit(2);
                }
            };
            cmd_join(
                &sdmx,
                source,
                &spec,
                settings.with_token(token),
                output.as_deref(),
            )
            .await
        }

        Commands::Inspect { input } => cmd_inspect(&input),

        Commands::Fetch {
            url,
            raw,
            xml,
            output,
        } => cmd_fetch(&url, raw, xml, &settings, output.as_deref()).await,

        Commands::Fields { url, token } => cmd_fields(&url, settings.with_token(token)).await,

        Commands::Where {
            input,
            geo_field,
            sdmx_field,
        } => cmd_where(&input, &geo_field, &sdmx_field).await,

        Commands::Dataflows { input } => cmd_dataflows(&input),

        Commands::Serve { port } => {
            let settings = match port {
                Some(port) => settings.with_port(port),
                None => settings,
            };
            sdmxgeo::server::start_server(settings).await
        }
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

enum GeometrySource {
    File(PathBuf),
    Service(String),
}

async fn cmd_decode(
    input: &Path,
    format: SourceFormat,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let decoded = decode_file(input, format).await?;
    write_json(&decoded.into_collection(), output)
}

async fn cmd_join(
    input: &Path,
    source: GeometrySource,
    spec: &JoinSpec,
    settings: Settings,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let decoded = decode_file(input, SourceFormat::Auto).await?;

    let outcome = match source {
        GeometrySource::File(path) => {
            let geometry = load_geometry_file(&path).await?;
            join_decoded(decoded, &geometry, spec)
        }
        GeometrySource::Service(url) => {
            let client = FeatureServiceClient::new(&settings)?;
            join_with_feature_service(decoded, &client, &url, spec).await?
        }
    };

    eprintln!(
        "\n📊 {} matched, {} without geometry",
        outcome.matched, outcome.unmatched
    );
    write_json(&outcome.layer, output)
}

fn cmd_inspect(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let content = fs::read_to_string(input)?;
    let content = content.trim_start_matches('\u{feff}').trim_start();

    let summary = if content.starts_with('<') {
        summarize_xml(content)?
    } else {
        let json: Value = serde_json::from_str(content)?;
        summarize(&json)?
    };
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &PayloadSummary) {
    if let Some(name) = &summary.layer_name {
        println!("📄 {}", name);
    }
    println!("   {} observations", summary.count);
    println!("   Fields: {}", summary.fields.join(", "));
}

async fn cmd_fetch(
    url: &str,
    raw: bool,
    xml: bool,
    settings: &Settings,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = SdmxClient::new(settings)?;

    if xml {
        if raw {
            let body = client.fetch_xml(url).await?;
            return write_text(&body, output);
        }
        let summary = summarize_xml_url(&client, url).await?;
        return write_json(&summary, output);
    }

    if raw {
        let payload = client.fetch_payload(url).await?;
        return write_json(&payload, output);
    }

    let decoded = decode_url(&client, url).await?;
    write_json(&decoded.into_collection(), output)
}

async fn cmd_where(
    input: &Path,
    geo_field: &str,
    sdmx_field: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let decoded = decode_file(input, SourceFormat::Auto).await?;
    println!("{}", where_clause(&decoded.records, geo_field, sdmx_field));
    Ok(())
}

async fn cmd_fields(url: &str, settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let client = FeatureServiceClient::new(&settings)?;
    let fields = client.fields(url).await?;

    eprintln!("📋 {} fields:\n", fields.len());
    for field in fields {
        println!("  {:<24} {:<28} {}", field.name, field.field_type, field.alias);
    }
    Ok(())
}

fn cmd_dataflows(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let json: Value = serde_json::from_str(&fs::read_to_string(input)?)?;
    let flows = list_dataflows(&json)?;

    eprintln!("📋 {} dataflows:\n", flows.len());
    for flow in flows {
        println!("  {}  {}", flow.id, flow.label);
    }
    Ok(())
}

fn write_json<T: Serialize>(value: &T, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    write_text(&serde_json::to_string_pretty(value)?, path)
}

fn write_text(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
