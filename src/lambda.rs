use crate::{
    control_plane::{FunctionControlPlane, FunctionPage},
    error::LifecycleError,
    model::{FunctionSpec, FunctionState, FunctionUpdate, InvocationResult, InvocationType},
    normalize::{conflict_as_existing, from_sdk_error, function_state, invocation_result},
};
use aws_sdk_lambda::{
    primitives::Blob,
    types::{Environment, FunctionCode, LogType, PackageType, VpcConfig},
    Client,
};
use std::collections::HashMap;

/// Lambda client implementation.
#[derive(Clone, Debug)]
pub struct LambdaClient {
    inner: Client,
}

impl LambdaClient {
    /// Initialize the Lambda client.
    #[tracing::instrument(skip(config))]
    pub fn new(config: &aws_types::SdkConfig) -> LambdaClient {
        tracing::info!("Initializing Lambda client");
        LambdaClient {
            inner: Client::new(config),
        }
    }
}

fn resource(name: &str) -> String {
    format!("function {name}")
}

fn environment(variables: HashMap<String, String>) -> Environment {
    Environment::builder().set_variables(Some(variables)).build()
}

impl FunctionControlPlane for LambdaClient {
    #[tracing::instrument(skip(self))]
    async fn get_function(&self, name: &str) -> Result<FunctionState, LifecycleError> {
        let res = self
            .inner
            .get_function()
            .function_name(name)
            .send()
            .await
            .map_err(|err| from_sdk_error(&resource(name), err))?;

        let image_uri = res.code().and_then(|code| code.image_uri());
        match res.configuration() {
            Some(config) => Ok(function_state(name, config, image_uri)),
            None => Err(LifecycleError::NotFound {
                resource: resource(name),
                source: None,
            }),
        }
    }

    #[tracing::instrument(skip(self, spec), fields(name = %spec.name, image_uri = %spec.image_uri))]
    async fn create_function(&self, spec: &FunctionSpec) -> Result<(), LifecycleError> {
        tracing::info!("creating function");

        let mut req = self
            .inner
            .create_function()
            .function_name(&spec.name)
            .role(&spec.role_arn)
            .package_type(PackageType::Image)
            .code(FunctionCode::builder().image_uri(&spec.image_uri).build())
            .memory_size(spec.memory_mb)
            .timeout(spec.timeout_s)
            .set_description(spec.description.clone());

        if !spec.environment.is_empty() {
            req = req.environment(environment(spec.environment.clone()));
        }
        if !spec.tags.is_empty() {
            req = req.set_tags(Some(spec.tags.clone()));
        }
        if let Some(vpc) = &spec.vpc {
            req = req.vpc_config(
                VpcConfig::builder()
                    .set_subnet_ids(Some(vpc.subnet_ids.clone()))
                    .set_security_group_ids(Some(vpc.security_group_ids.clone()))
                    .build(),
            );
        }

        req.send().await.map_err(|err| {
            let resource = resource(&spec.name);
            conflict_as_existing(&resource, from_sdk_error(&resource, err))
        })?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn update_function_code(
        &self,
        name: &str,
        image_uri: &str,
    ) -> Result<(), LifecycleError> {
        tracing::info!("updating function image");
        self.inner
            .update_function_code()
            .function_name(name)
            .image_uri(image_uri)
            .send()
            .await
            .map_err(|err| from_sdk_error(&resource(name), err))?;

        Ok(())
    }

    #[tracing::instrument(skip(self, update), fields(name = %update.name))]
    async fn update_function_configuration(
        &self,
        update: &FunctionUpdate,
    ) -> Result<(), LifecycleError> {
        tracing::info!("updating function configuration");
        self.inner
            .update_function_configuration()
            .function_name(&update.name)
            .set_memory_size(update.memory_mb)
            .set_timeout(update.timeout_s)
            .set_description(update.description.clone())
            .set_role(update.role_arn.clone())
            .set_environment(update.environment.clone().map(environment))
            .send()
            .await
            .map_err(|err| from_sdk_error(&resource(&update.name), err))?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_function(&self, name: &str) -> Result<(), LifecycleError> {
        tracing::info!("deleting function");
        self.inner
            .delete_function()
            .function_name(name)
            .send()
            .await
            .map_err(|err| from_sdk_error(&resource(name), err))?;

        Ok(())
    }

    #[tracing::instrument(skip(self, payload), fields(payload_len = payload.len()))]
    async fn invoke(
        &self,
        name: &str,
        payload: Vec<u8>,
        invocation_type: InvocationType,
    ) -> Result<InvocationResult, LifecycleError> {
        let mut req = self
            .inner
            .invoke()
            .function_name(name)
            .invocation_type(invocation_type.as_str().into());

        if !payload.is_empty() {
            req = req.payload(Blob::new(payload));
        }
        // the log tail only exists for synchronous invocations
        if invocation_type == InvocationType::RequestResponse {
            req = req.log_type(LogType::Tail);
        }

        let res = req
            .send()
            .await
            .map_err(|err| from_sdk_error(&resource(name), err))?;

        Ok(invocation_result(&res))
    }

    #[tracing::instrument(skip(self))]
    async fn list_functions(
        &self,
        marker: Option<String>,
        max_items: Option<i32>,
    ) -> Result<FunctionPage, LifecycleError> {
        let res = self
            .inner
            .list_functions()
            .set_marker(marker)
            .set_max_items(max_items)
            .send()
            .await
            .map_err(|err| from_sdk_error("function list", err))?;

        let functions = res
            .functions()
            .iter()
            .map(|config| function_state("", config, None))
            .collect();

        Ok(FunctionPage {
            functions,
            next_marker: res.next_marker().map(str::to_string),
        })
    }
}
