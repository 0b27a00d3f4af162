use crate::Result;
use crate::assertion::run_assertions_with_options;
use crate::error::RestbundleError;
use crate::http::{CancelToken, Client, ResponseRecord};
use crate::parser::{Bundle, EffectiveRequest, RequestSpec, merge_request};
use crate::runner::types::{RequestOutcome, RequestResult, RunReport};
use crate::variable::{EnvironmentSet, VariableStore, run_captures};
use std::time::{Duration, Instant};

/// 运行所用的变量来源
#[derive(Debug, Clone, Default)]
pub struct RunEnvironment {
    /// 选中的环境名
    pub env_name: Option<String>,
    /// 外部变量文件，按优先级从低到高
    pub external: Vec<EnvironmentSet>,
    /// `--var key=value` 覆盖
    pub overrides: Vec<(String, String)>,
}

impl RunEnvironment {
    pub fn new(env_name: Option<String>) -> Self {
        Self {
            env_name,
            ..Self::default()
        }
    }
}

/// 请求编排器
///
/// 每次顶层运行（单个请求或全部请求）都会重建变量存储，
/// 批量运行时请求按声明顺序依次执行，前一个请求的捕获对后续请求可见。
pub struct TestExecutor {
    client: Client,
    bundle: Bundle,
    environment: RunEnvironment,
    progress_interval: Duration,
}

impl TestExecutor {
    pub fn new(bundle: Bundle, client: Client, environment: RunEnvironment) -> Self {
        Self {
            client,
            bundle,
            environment,
            progress_interval: Duration::from_secs(1),
        }
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    /// 为一次顶层运行创建新的变量存储
    fn fresh_store(&self) -> VariableStore {
        let mut store = VariableStore::new();
        store.load_environment(
            self.environment.env_name.as_deref(),
            &self.bundle.variables,
            &self.environment.external,
        );
        store.apply_overrides(&self.environment.overrides);
        store
    }

    /// 合并单个请求，失败时记录为 Invalid 结果
    fn merge_one(
        &self,
        spec: &RequestSpec,
        request_number: usize,
    ) -> std::result::Result<EffectiveRequest, RequestResult> {
        merge_request(self.bundle.common.as_ref(), spec).map_err(|error| {
            tracing::error!("{}", error);
            RequestResult::new(
                request_number,
                spec.name.as_str(),
                RequestOutcome::Invalid { error },
            )
        })
    }

    /// 批量执行所有请求
    ///
    /// 发出任何请求之前先合并校验全部请求，只要有一个无效，
    /// 无效请求记为 Invalid，其余记为 NotRun，不做任何网络调用。
    /// 取消后当前请求记为 Cancelled，其余请求记为 NotRun
    pub async fn execute_all(&self, cancel: &CancelToken) -> RunReport {
        let mut store = self.fresh_store();

        let merged: Vec<_> = self
            .bundle
            .requests
            .iter()
            .enumerate()
            .map(|(index, spec)| self.merge_one(spec, index + 1))
            .collect();

        if merged.iter().any(|m| m.is_err()) {
            tracing::error!("Bundle contains invalid requests, nothing was sent");
            let results = merged
                .into_iter()
                .zip(&self.bundle.requests)
                .enumerate()
                .map(|(index, (merged, spec))| match merged {
                    Ok(_) => {
                        RequestResult::new(index + 1, spec.name.as_str(), RequestOutcome::NotRun)
                    }
                    Err(invalid) => invalid,
                })
                .collect();
            return RunReport {
                results,
                variables: store,
            };
        }

        let mut results = Vec::with_capacity(merged.len());
        for (index, effective) in merged.into_iter().flatten().enumerate() {
            let request_number = index + 1;

            if cancel.is_cancelled() {
                results.push(RequestResult::new(
                    request_number,
                    effective.name.as_str(),
                    RequestOutcome::NotRun,
                ));
                continue;
            }

            let result = self
                .execute_one(&effective, request_number, &mut store, cancel)
                .await;
            results.push(result);
        }

        RunReport {
            results,
            variables: store,
        }
    }

    /// 执行单个命名请求
    pub async fn execute_request(&self, name: &str, cancel: &CancelToken) -> Result<RunReport> {
        let (index, spec) = self
            .bundle
            .requests
            .iter()
            .enumerate()
            .find(|(_, r)| r.name == name)
            .ok_or_else(|| RestbundleError::UnknownRequest(name.to_string()))?;

        let mut store = self.fresh_store();
        let result = match self.merge_one(spec, index + 1) {
            Ok(effective) => self.execute_one(&effective, index + 1, &mut store, cancel).await,
            Err(invalid) => invalid,
        };

        Ok(RunReport {
            results: vec![result],
            variables: store,
        })
    }

    /// 替换变量、发送请求，再执行断言与捕获
    async fn execute_one(
        &self,
        effective: &EffectiveRequest,
        request_number: usize,
        store: &mut VariableStore,
        cancel: &CancelToken,
    ) -> RequestResult {
        let name = effective.name.as_str();
        let (resolved, undefined) = effective.resolve(store);
        if !undefined.is_empty() {
            tracing::warn!(
                request = %name,
                "Undefined variables: {}",
                undefined.join(", ")
            );
        }

        let mut result = RequestResult::new(request_number, name, RequestOutcome::NotRun);
        result.method = resolved.method.to_uppercase();
        result.url = resolved.full_url();
        result.undefined = undefined;
        result.options = resolved.options;

        tracing::info!(request = %name, method = %result.method, url = %result.url, "Executing request");
        let start = Instant::now();
        let response = self.execute_with_progress(&resolved, cancel).await;
        result.duration = start.elapsed();

        if response.is_cancelled() {
            tracing::info!(request = %name, "Request cancelled, skipping assertions and captures");
            result.outcome = RequestOutcome::Cancelled;
            return result;
        }

        if response.is_error() {
            tracing::warn!(request = %name, "{}", response.body);
            result.outcome = RequestOutcome::Failed { response };
            return result;
        }

        let assertions =
            run_assertions_with_options(&resolved.tests, &response, resolved.options.stop_on_failure);
        let capture_errors = run_captures(&resolved.captures, &response, store);

        tracing::info!(
            request = %name,
            status = response.status_code().unwrap_or_default(),
            elapsed_ms = result.duration.as_millis() as u64,
            assertions = assertions.total,
            failed = assertions.failed,
            "Request finished"
        );

        result.outcome = RequestOutcome::Completed {
            response,
            assertions,
            capture_errors,
        };
        result
    }

    /// 发送请求，等待期间按固定间隔输出进度
    async fn execute_with_progress(
        &self,
        request: &EffectiveRequest,
        cancel: &CancelToken,
    ) -> ResponseRecord {
        let start = Instant::now();
        let execution = self.client.execute(request, cancel);
        tokio::pin!(execution);

        let mut ticker = tokio::time::interval(self.progress_interval);
        // 第一次 tick 立即完成
        ticker.tick().await;

        loop {
            tokio::select! {
                response = &mut execution => return response,
                _ = ticker.tick() => {
                    tracing::info!(
                        request = %request.name,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Waiting for response (Ctrl-C to cancel)"
                    );
                }
            }
        }
    }
}
