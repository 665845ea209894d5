/// How the cells of a details column are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Thumbnail,
    Url,
    Bytes,
    TimespanMs,
    Numeric,
    Text,
    Code,
    Other,
}

impl ValueType {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "thumbnail" => ValueType::Thumbnail,
            "url" => ValueType::Url,
            "bytes" => ValueType::Bytes,
            "timespanMs" | "ms" => ValueType::TimespanMs,
            "numeric" => ValueType::Numeric,
            "text" => ValueType::Text,
            "code" => ValueType::Code,
            _ => ValueType::Other,
        }
    }
}
