//! 字段解析工具
//!
//! 后端同一个属性可能以多种字段名返回（`paper_part` / `paperPart` / `name` ...），
//! 这里按候选顺序查找，并对数值做宽松转换。

use serde_json::Value as JsonValue;

/// 按顺序尝试候选字段名，返回第一个非 null 的值
pub fn resolve<'a>(obj: &'a JsonValue, keys: &[&str]) -> Option<&'a JsonValue> {
    let map = obj.as_object()?;
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find(|v| !v.is_null())
}

/// 把任意 JSON 值宽松地转换为非负整数
///
/// 数字、数字字符串（"10"、" 7.5 "）都可以转换；负数按 0 处理；
/// 其他类型返回 None。
pub fn coerce_u32(value: &JsonValue) -> Option<u32> {
    let number = match value {
        JsonValue::Number(n) => n.as_f64()?,
        JsonValue::String(s) => s.trim().parse::<f64>().ok()?,
        JsonValue::Bool(_) | JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => {
            return None
        }
    };
    if !number.is_finite() {
        return None;
    }
    Some(number.round().clamp(0.0, u32::MAX as f64) as u32)
}

/// 读取数值字段，缺失或无法转换时返回默认值
pub fn u32_field(obj: &JsonValue, keys: &[&str], default: u32) -> u32 {
    resolve(obj, keys).and_then(coerce_u32).unwrap_or(default)
}

/// 读取浮点字段
pub fn f64_field(obj: &JsonValue, keys: &[&str]) -> Option<f64> {
    let value = resolve(obj, keys)?;
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// 读取字符串字段，数字会被转换为字符串
pub fn string_field(obj: &JsonValue, keys: &[&str]) -> Option<String> {
    match resolve(obj, keys)? {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 读取布尔字段，兼容 "true" / 1 之类的写法
pub fn bool_field(obj: &JsonValue, keys: &[&str]) -> Option<bool> {
    match resolve(obj, keys)? {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::Number(n) => n.as_f64().map(|v| v != 0.0),
        JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// 读取数组字段
pub fn array_field<'a>(obj: &'a JsonValue, keys: &[&str]) -> Option<&'a [JsonValue]> {
    resolve(obj, keys)?.as_array().map(|v| v.as_slice())
}
