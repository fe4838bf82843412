use serde::{Deserialize, Deserializer};

/// 反序列化数组字段，处理 null 值（GraphQL 可空列表）
pub(crate) fn deserialize_vec_or_null<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let opt = Option::<Vec<T>>::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

/// 生成客户端 ID（条目、属性在首次保存前只有这一个稳定标识）
pub fn generate_client_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 生成请求的 operationID，便于在服务端日志中关联一次请求
pub fn generate_operation_id(prefix: &str) -> String {
    format!("{}-{}", prefix, chrono::Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "deserialize_vec_or_null")]
        items: Vec<u32>,
    }

    #[test]
    fn null_list_becomes_empty() {
        let h: Holder = serde_json::from_str(r#"{"items": null}"#).unwrap();
        assert!(h.items.is_empty());
        let h: Holder = serde_json::from_str(r#"{}"#).unwrap();
        assert!(h.items.is_empty());
        let h: Holder = serde_json::from_str(r#"{"items": [1, 2]}"#).unwrap();
        assert_eq!(h.items, vec![1, 2]);
    }

    #[test]
    fn client_ids_are_unique() {
        assert_ne!(generate_client_id(), generate_client_id());
    }
}
