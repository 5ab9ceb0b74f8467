//! CLI 체인 표현식 파싱.
//!
//! 형식: `rotate:angle=90,scale=1.0+flip:flip_code=1`
//! 단계는 `+`, 연산 ID와 파라미터는 `:`, 파라미터끼리는 `,`로 구분한다.

use cvstudio_core::error::CoreError;
use cvstudio_core::models::operation::OperationKind;

/// 체인 한 단계
#[derive(Debug, Clone, PartialEq)]
pub struct ChainStep {
    pub kind: OperationKind,
    /// `key=value` 필드 (비어 있으면 저장된 값 또는 기본값 사용)
    pub fields: Vec<(String, String)>,
}

/// 체인 표현식 파싱
///
/// 큐 규칙과 어긋나는 조합(exclusive 연산 혼합, 중복 선택)은 여기서 거부한다.
pub fn parse_chain(expr: &str) -> Result<Vec<ChainStep>, CoreError> {
    let mut steps: Vec<ChainStep> = Vec::new();

    for raw in expr.split('+').map(str::trim).filter(|s| !s.is_empty()) {
        let (id, params) = match raw.split_once(':') {
            Some((id, params)) => (id.trim(), params),
            None => (raw, ""),
        };
        let kind = OperationKind::from_id(id)?;

        if steps.iter().any(|step| step.kind == kind) {
            return Err(CoreError::validation("chain", format!("중복된 연산: {kind}")));
        }

        let fields = params
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|pair| {
                pair.split_once('=')
                    .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                    .ok_or_else(|| {
                        CoreError::validation(
                            "chain",
                            format!("{kind}: '{pair}' 는 key=value 형식이어야 합니다"),
                        )
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        steps.push(ChainStep { kind, fields });
    }

    if steps.is_empty() {
        return Err(CoreError::NoOperationSelected);
    }

    if steps.len() > 1 {
        if let Some(step) = steps.iter().find(|step| step.kind.is_exclusive()) {
            return Err(CoreError::validation(
                "chain",
                format!("{}는 다른 연산과 함께 실행할 수 없습니다", step.kind),
            ));
        }
    }

    Ok(steps)
}
