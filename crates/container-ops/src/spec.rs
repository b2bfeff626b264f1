//! 컨테이너 스펙 — 이미지 참조와 리소스 상한 검증
//!
//! 리소스 수량은 쿠버네티스 표기를 따릅니다: CPU는 밀리코어(`500m`)
//! 또는 코어 수(`2`, `0.5`), 메모리는 `Ki`/`Mi`/`Gi` 접미사 또는
//! 바이트입니다.

use serde::{Deserialize, Serialize};

use drydock_core::error::ContainerError;

use crate::config::ContainerOpsConfig;

/// CPU 수량을 밀리코어로 파싱합니다 (`500m`, `2`, `0.5`).
pub fn parse_cpu(quantity: &str) -> Result<u64, ContainerError> {
    let quantity = quantity.trim();
    if quantity.is_empty() {
        return Err(ContainerError::InvalidSpec {
            field: "cpu".to_owned(),
            reason: "quantity must not be empty".to_owned(),
        });
    }

    if let Some(millis) = quantity.strip_suffix('m') {
        return millis.parse::<u64>().map_err(|_| ContainerError::InvalidSpec {
            field: "cpu".to_owned(),
            reason: format!("'{quantity}' is not a valid millicore quantity"),
        });
    }

    let cores: f64 = quantity.parse().map_err(|_| ContainerError::InvalidSpec {
        field: "cpu".to_owned(),
        reason: format!("'{quantity}' is not a valid core quantity"),
    })?;
    if !cores.is_finite() || cores < 0.0 {
        return Err(ContainerError::InvalidSpec {
            field: "cpu".to_owned(),
            reason: format!("'{quantity}' is not a valid core quantity"),
        });
    }
    Ok((cores * 1000.0).round() as u64)
}

/// 메모리 수량을 바이트로 파싱합니다 (`512Mi`, `2Gi`, `1024`).
pub fn parse_memory(quantity: &str) -> Result<u64, ContainerError> {
    let quantity = quantity.trim();
    let invalid = |reason: String| ContainerError::InvalidSpec {
        field: "memory".to_owned(),
        reason,
    };

    if quantity.is_empty() {
        return Err(invalid("quantity must not be empty".to_owned()));
    }

    let (digits, multiplier) = if let Some(d) = quantity.strip_suffix("Ki") {
        (d, 1024u64)
    } else if let Some(d) = quantity.strip_suffix("Mi") {
        (d, 1024 * 1024)
    } else if let Some(d) = quantity.strip_suffix("Gi") {
        (d, 1024 * 1024 * 1024)
    } else {
        (quantity, 1)
    };

    let value: u64 = digits
        .parse()
        .map_err(|_| invalid(format!("'{quantity}' is not a valid memory quantity")))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| invalid(format!("'{quantity}' overflows byte representation")))
}

/// 이미지 참조를 구문 검증합니다 (`registry/repo:tag` 형태).
///
/// 런타임에 존재하는 이미지인지는 묻지 않습니다 — 그건 백엔드의
/// 몫입니다.
pub fn validate_image_reference(image: &str) -> Result<(), ContainerError> {
    let invalid = |reason: &str| ContainerError::InvalidSpec {
        field: "image".to_owned(),
        reason: reason.to_owned(),
    };

    if image.is_empty() {
        return Err(invalid("image reference must not be empty"));
    }
    if image.len() > 255 {
        return Err(invalid("image reference must be at most 255 characters"));
    }
    if !image
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/' | ':' | '@'))
    {
        return Err(invalid("image reference contains invalid characters"));
    }
    if image.starts_with(['.', '-', '/', ':', '@']) || image.ends_with(['.', '-', '/', ':', '@']) {
        return Err(invalid("image reference must not start or end with a separator"));
    }

    // 마지막 경로 요소 뒤의 태그는 최대 한 개
    let name_part = image.rsplit('/').next().unwrap_or(image);
    if name_part.matches(':').count() > 1 {
        return Err(invalid("image reference has more than one tag separator"));
    }

    Ok(())
}

/// 컨테이너 이름을 구문 검증합니다.
fn validate_name(name: &str) -> Result<(), ContainerError> {
    let invalid = |reason: &str| ContainerError::InvalidSpec {
        field: "name".to_owned(),
        reason: reason.to_owned(),
    };

    if name.is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if name.len() > 128 {
        return Err(invalid("name must be at most 128 characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(invalid("name contains invalid characters"));
    }
    if name.starts_with(['.', '-']) {
        return Err(invalid("name must not start with a separator"));
    }
    Ok(())
}

/// 컨테이너 생성 스펙
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// 컨테이너 이름
    pub name: String,
    /// 이미지 참조
    pub image: String,
    /// 실행 명령 (비어 있으면 이미지 기본값)
    pub command: Vec<String>,
    /// 환경변수
    pub env: Vec<(String, String)>,
    /// 요청 CPU 상한 (쿠버네티스 표기, 없으면 설정 기본값)
    pub cpu: Option<String>,
    /// 요청 메모리 상한 (쿠버네티스 표기, 없으면 설정 기본값)
    pub memory: Option<String>,
}

impl ContainerSpec {
    /// 이름과 이미지로 스펙을 만듭니다.
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            command: Vec::new(),
            env: Vec::new(),
            cpu: None,
            memory: None,
        }
    }

    /// 실행 명령을 설정합니다.
    pub fn command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    /// 환경변수를 추가합니다.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// 요청 CPU 상한을 설정합니다.
    pub fn cpu(mut self, quantity: impl Into<String>) -> Self {
        self.cpu = Some(quantity.into());
        self
    }

    /// 요청 메모리 상한을 설정합니다.
    pub fn memory(mut self, quantity: impl Into<String>) -> Self {
        self.memory = Some(quantity.into());
        self
    }

    /// 설정 상한에 대해 스펙을 검증합니다.
    ///
    /// 이름/이미지 구문과 요청 리소스가 설정 상한 이내인지 확인합니다.
    /// 위반은 [`ContainerError::InvalidSpec`]으로 즉시 표면화되며
    /// 재시도 대상이 아닙니다.
    pub fn validate(&self, config: &ContainerOpsConfig) -> Result<(), ContainerError> {
        validate_name(&self.name)?;
        validate_image_reference(&self.image)?;

        let cpu_bound = parse_cpu(&config.cpu_limit)?;
        if let Some(cpu) = &self.cpu {
            let requested = parse_cpu(cpu)?;
            if requested > cpu_bound {
                return Err(ContainerError::InvalidSpec {
                    field: "cpu".to_owned(),
                    reason: format!(
                        "requested {requested}m exceeds configured limit {cpu_bound}m"
                    ),
                });
            }
        }

        let memory_bound = parse_memory(&config.memory_limit)?;
        if let Some(memory) = &self.memory {
            let requested = parse_memory(memory)?;
            if requested > memory_bound {
                return Err(ContainerError::InvalidSpec {
                    field: "memory".to_owned(),
                    reason: format!(
                        "requested {requested} bytes exceeds configured limit {memory_bound} bytes"
                    ),
                });
            }
        }

        Ok(())
    }
}
