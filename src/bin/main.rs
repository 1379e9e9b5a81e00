use clap::{Parser, Subcommand};
use lambda_lifecycle::{
    deploy,
    model::{FunctionSpec, FunctionState, FunctionUpdate, InvocationType, RoleSpec, VpcSettings},
    render, Desired, FunctionLifecycle, FunctionReconciler, IamClient, LambdaClient,
    LifecycleError, OutputFormat, RoleProvisioner, Settings, WaitSettings,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::{collections::HashMap, error::Error, process::ExitCode, time::Duration};

/// Manage AWS Lambda functions packaged as container images
#[derive(Parser)]
#[command(name = "lambda_lifecycle")]
#[command(version)]
#[command(about = "Manage AWS Lambda functions packaged as container images", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// AWS region, defaults to the provider chain
    #[arg(long, env = "AWS_REGION", global = true)]
    region: Option<String>,

    /// Named AWS profile
    #[arg(long, env = "AWS_PROFILE", global = true)]
    profile: Option<String>,

    /// Output format: json or text
    #[arg(short, long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Upper bound in seconds for all the waits of one command together
    #[arg(long, value_name = "SECONDS", global = true)]
    wait_timeout: Option<u64>,

    /// Log debug details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Create a function, provisioning its execution role when missing
    Create {
        /// Function name
        name: String,
        /// Image reference, e.g. 123456789012.dkr.ecr.us-east-1.amazonaws.com/repo:tag
        #[arg(long)]
        image_uri: String,
        /// Memory in MB
        #[arg(long, default_value_t = lambda_lifecycle::model::DEFAULT_MEMORY_MB)]
        memory: i32,
        /// Timeout in seconds
        #[arg(long, default_value_t = lambda_lifecycle::model::DEFAULT_TIMEOUT_S)]
        timeout: i32,
        #[arg(long)]
        description: Option<String>,
        /// Execution role name, defaults to <name>-execution-role
        #[arg(long)]
        role_name: Option<String>,
        /// Environment variables as a JSON object
        #[arg(long, value_name = "JSON")]
        env: Option<String>,
        /// Tags as a JSON object
        #[arg(long, value_name = "JSON")]
        tags: Option<String>,
        #[arg(long, value_delimiter = ',')]
        subnet_ids: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        security_group_ids: Vec<String>,
    },
    /// Change the given fields of an existing function
    Update {
        /// Function name
        name: String,
        #[arg(long)]
        image_uri: Option<String>,
        /// Memory in MB
        #[arg(long)]
        memory: Option<i32>,
        /// Timeout in seconds
        #[arg(long)]
        timeout: Option<i32>,
        #[arg(long)]
        description: Option<String>,
        /// Replacement environment variables as a JSON object
        #[arg(long, value_name = "JSON")]
        env: Option<String>,
        #[arg(long)]
        role_arn: Option<String>,
    },
    /// Invoke a function
    Invoke {
        /// Function name
        name: String,
        /// Payload as a JSON document
        #[arg(long, value_name = "JSON")]
        payload: Option<String>,
        /// RequestResponse, Event or DryRun
        #[arg(long, default_value = "RequestResponse")]
        invocation_type: InvocationType,
    },
    /// Show a function
    Describe {
        /// Function name
        name: String,
    },
    /// Delete a function, succeeding when it is already gone
    Delete {
        /// Function name
        name: String,
    },
    /// List functions
    List {
        /// Stop after this many functions
        #[arg(long)]
        max_items: Option<usize>,
    },
    /// Make sure an execution role exists
    EnsureRole {
        /// Role name
        role_name: String,
    },
    /// Detach the policies of an execution role and delete it
    DeleteRole {
        /// Role name
        role_name: String,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct FunctionList {
    functions: Vec<FunctionState>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    match run(cli).await {
        Ok(out) => {
            println!("{out}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}: {err}", err.kind());
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<String, LifecycleError> {
    let mut waits = WaitSettings::default();
    if let Some(seconds) = cli.wait_timeout {
        waits = waits.capped(Duration::from_secs(seconds));
    }
    let settings = Settings {
        region: cli.region,
        profile: cli.profile,
        waits,
    };
    let config = settings.load_sdk_config().await;
    let format = cli.output;

    match cli.command {
        Command::Create {
            name,
            image_uri,
            memory,
            timeout,
            description,
            role_name,
            env,
            tags,
            subnet_ids,
            security_group_ids,
        } => {
            let vpc = (!subnet_ids.is_empty() || !security_group_ids.is_empty()).then(|| {
                VpcSettings {
                    subnet_ids,
                    security_group_ids,
                }
            });
            let role_name = role_name.unwrap_or_else(|| RoleSpec::default_name_for(&name));
            let spec = FunctionSpec {
                memory_mb: memory,
                timeout_s: timeout,
                description,
                environment: parse_map("env", env.as_deref())?.unwrap_or_default(),
                tags: parse_map("tags", tags.as_deref())?.unwrap_or_default(),
                vpc,
                ..FunctionSpec::new(name, image_uri, "")
            };

            let roles = RoleProvisioner::new(IamClient::new(&config));
            let state = deploy(
                &roles,
                LambdaClient::new(&config),
                settings.waits,
                &role_name,
                spec,
            )
            .await?;
            render(&state, format)
        }
        Command::Update {
            name,
            image_uri,
            memory,
            timeout,
            description,
            env,
            role_arn,
        } => {
            let update = FunctionUpdate {
                image_uri,
                memory_mb: memory,
                timeout_s: timeout,
                description,
                environment: parse_map("env", env.as_deref())?,
                role_arn,
                ..FunctionUpdate::new(name)
            };
            let state = FunctionReconciler::new(LambdaClient::new(&config), settings.waits)
                .reconcile(&Desired::Update(update))
                .await?;
            render(&state, format)
        }
        Command::Invoke {
            name,
            payload,
            invocation_type,
        } => {
            let payload = match payload {
                Some(raw) => serde_json::from_str(&raw).map_err(|err| {
                    LifecycleError::validation(format!("payload is not valid JSON: {err}"))
                })?,
                None => Value::Null,
            };
            let result = FunctionLifecycle::new(LambdaClient::new(&config))
                .invoke(&name, &payload, invocation_type)
                .await?;
            render(&result, format)
        }
        Command::Describe { name } => {
            let state = FunctionLifecycle::new(LambdaClient::new(&config))
                .describe(&name)
                .await?;
            render(&state, format)
        }
        Command::Delete { name } => {
            FunctionLifecycle::new(LambdaClient::new(&config))
                .delete(&name)
                .await?;
            render(&json!({ "FunctionName": name, "Deleted": true }), format)
        }
        Command::List { max_items } => {
            let lifecycle = FunctionLifecycle::new(LambdaClient::new(&config));
            let functions = lifecycle.list(max_items).try_collect().await?;
            render(&FunctionList { functions }, format)
        }
        Command::EnsureRole { role_name } => {
            let role = RoleProvisioner::new(IamClient::new(&config))
                .ensure_role(&role_name)
                .await?;
            render(&role, format)
        }
        Command::DeleteRole { role_name } => {
            RoleProvisioner::new(IamClient::new(&config))
                .delete_role(&role_name)
                .await?;
            render(&json!({ "RoleName": role_name, "Deleted": true }), format)
        }
    }
}

fn parse_map(
    flag: &str,
    raw: Option<&str>,
) -> Result<Option<HashMap<String, String>>, LifecycleError> {
    raw.map(|raw| {
        serde_json::from_str(raw).map_err(|err| {
            LifecycleError::validation(format!(
                "--{flag} must be a JSON object of strings: {err}"
            ))
        })
    })
    .transpose()
}
