use std::{io, process::ExitCode};

use clap::{Parser, Subcommand};
use featureservice_converter::{
    Conversion, ConvertError, Converter, ErrorResponse, Fs2SqlRequest, Sql2FsRequest,
    Sql2SqlRequest,
    config::GeostoreConfig,
    converter::SpatialParams,
    feature_service::FeatureServiceQuery,
    geostore::{DisabledGeostore, HttpGeostoreClient},
    sql_parser::parsed_query::ParsedQuery,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Converts between SQL and ArcGIS FeatureServer queries, reading the input on stdin.
#[derive(Parser, Debug)]
#[command(name = "fsconvert", version)]
struct Args {
    #[command(flatten)]
    geostore: GeostoreConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct SpatialArgs {
    /// Geostore identifier whose geometry filters the query
    #[arg(long)]
    geostore: Option<String>,

    /// Inline GeoJSON geometry, Feature or FeatureCollection
    #[arg(long)]
    geojson: Option<String>,
}

impl SpatialArgs {
    fn into_params(self) -> Result<SpatialParams, ConvertError> {
        Ok(SpatialParams {
            geostore: self.geostore.map(Into::into),
            geojson: self
                .geojson
                .map(|geojson| serde_json::from_str(&geojson))
                .transpose()?,
        })
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// FeatureServer query object (JSON) to SQL
    Fs2sql {
        /// Overrides the `tableName` of the input
        #[arg(long)]
        table_name: Option<String>,
        #[command(flatten)]
        spatial: SpatialArgs,
    },
    /// SQL to FeatureServer query
    Sql2fs {
        #[command(flatten)]
        spatial: SpatialArgs,
        #[arg(long)]
        exclude_geometries: bool,
    },
    /// SQL to SQL with an injected spatial filter
    Sql2sql {
        #[command(flatten)]
        spatial: SpatialArgs,
        /// Filter on the raster geometry column
        #[arg(long)]
        raster: bool,
        #[arg(long)]
        experimental: bool,
    },
    /// Parse, validate and re-emit SQL
    CheckSql,
    /// Query tree (JSON) to SQL
    Json2sql,
}

async fn run(converter: &Converter, command: Command, input: &str) -> Result<Conversion, ConvertError> {
    match command {
        Command::Fs2sql {
            table_name,
            spatial,
        } => {
            let mut fs = FeatureServiceQuery::try_from(input)?;
            if let Some(table_name) = table_name {
                fs.table_name = Some(table_name.into());
            }
            let request = Fs2SqlRequest {
                fs,
                spatial: spatial.into_params()?,
            };
            converter.fs2sql(&request).await
        }
        Command::Sql2fs {
            spatial,
            exclude_geometries,
        } => {
            let request = Sql2FsRequest {
                sql: input.into(),
                spatial: spatial.into_params()?,
                exclude_geometries,
            };
            converter.sql2fs(&request).await
        }
        Command::Sql2sql {
            spatial,
            raster,
            experimental,
        } => {
            let request = Sql2SqlRequest {
                sql: input.into(),
                spatial: spatial.into_params()?,
                raster,
                experimental,
            };
            converter.sql2sql(&request).await
        }
        Command::CheckSql => converter.check_sql(input),
        Command::Json2sql => {
            let parsed: ParsedQuery = serde_json::from_str(input)?;
            converter.json2sql(parsed)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let converter = match HttpGeostoreClient::from_config(&args.geostore) {
        Ok(Some(client)) => Converter::new(client),
        Ok(None) => {
            info!("No GATEWAY_URL configured, geostore lookups are disabled");
            Converter::new(DisabledGeostore)
        }
        Err(e) => {
            error!(error = %e, "Failed to build the geostore client");
            return ExitCode::FAILURE;
        }
    };

    // read stdin
    let input = match io::read_to_string(io::stdin()) {
        Ok(input) => input,
        Err(e) => {
            error!(error = %e, "Failed to read from stdin");
            return ExitCode::FAILURE;
        }
    };

    match run(&converter, args.command, input.trim()).await {
        Ok(conversion) => match serde_json::to_string_pretty(&conversion) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "Failed to serialize the conversion");
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            error!(error = %e, status = e.status_code(), "Conversion failed");
            if let Ok(json) = serde_json::to_string(&ErrorResponse::from(&e)) {
                println!("{json}");
            }
            ExitCode::FAILURE
        }
    }
}
