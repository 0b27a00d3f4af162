use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// 单个环境的变量表
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(transparent)]
pub struct Environment {
    pub variables: Map<String, Value>,
}

/// 环境集合：环境名 → 变量表
///
/// 来源可以是外部变量文件，也可以是 bundle 的 `variables` 段
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(transparent)]
pub struct EnvironmentSet {
    pub environments: BTreeMap<String, Environment>,
}

impl EnvironmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置某个环境下的变量
    pub fn insert(&mut self, env: impl Into<String>, name: impl Into<String>, value: Value) {
        self.environments
            .entry(env.into())
            .or_default()
            .variables
            .insert(name.into(), value);
    }

    /// 获取指定环境的变量
    pub fn get_environment(&self, env_name: &str) -> Option<&Environment> {
        self.environments.get(env_name)
    }

    /// 合并另一个集合，同名变量以 `other` 为准
    pub fn merge(&mut self, other: &EnvironmentSet) {
        for (env, vars) in &other.environments {
            let target = self.environments.entry(env.clone()).or_default();
            for (name, value) in &vars.variables {
                target.variables.insert(name.clone(), value.clone());
            }
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.environments.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }
}

/// 一次运行使用的变量存储
///
/// `base` 来自环境（外部文件 < bundle < CLI 覆盖），`captured` 来自响应捕获。
/// 查找时捕获值优先。值保持原生类型，插值时才转为文本。
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    base: HashMap<String, Value>,
    captured: HashMap<String, Value>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 重建基础变量并清空所有捕获值
    ///
    /// 外部文件按给定顺序叠加，bundle 中的同名变量覆盖外部文件
    pub fn load_environment(
        &mut self,
        env_name: Option<&str>,
        bundle_variables: &EnvironmentSet,
        external: &[EnvironmentSet],
    ) {
        self.base.clear();
        self.captured.clear();

        let Some(env_name) = env_name else {
            tracing::debug!("No environment selected, starting with empty variables");
            return;
        };

        for source in external.iter().chain(std::iter::once(bundle_variables)) {
            if let Some(env) = source.get_environment(env_name) {
                for (key, value) in &env.variables {
                    self.base.insert(key.clone(), value.clone());
                }
            }
        }

        tracing::debug!(
            env = env_name,
            count = self.base.len(),
            "Environment variables loaded"
        );
    }

    /// 应用 CLI 覆盖（`--var key=value`），优先于环境变量
    pub fn apply_overrides(&mut self, overrides: &[(String, String)]) {
        for (key, value) in overrides {
            self.base
                .insert(key.clone(), Value::String(value.clone()));
        }
    }

    /// 写入基础变量
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.base.insert(key.into(), value);
    }

    /// 写入捕获变量，总是覆盖
    pub fn set_captured(&mut self, key: impl Into<String>, value: Value) {
        self.captured.insert(key.into(), value);
    }

    /// 查找变量，捕获值优先
    pub fn resolve(&self, key: &str) -> Option<&Value> {
        self.captured.get(key).or_else(|| self.base.get(key))
    }

    pub fn captured(&self) -> &HashMap<String, Value> {
        &self.captured
    }

    pub fn len(&self) -> usize {
        self.base
            .keys()
            .chain(self.captured.keys().filter(|k| !self.base.contains_key(*k)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty() && self.captured.is_empty()
    }
}
