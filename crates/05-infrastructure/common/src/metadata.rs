//! 元数据定义
//!
//! 提供组件键和类型键

use serde::Serialize;
use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// 类型键
///
/// 以 `TypeId` 判等，同时保留类型名称用于日志和错误信息。
/// 可以表示具体类型，也可以表示 `dyn Trait` 这样的能力类型。
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// 从类型获取类型键
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// 类型ID
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// 完整类型名称
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 获取简短的类型名称（不包含模块路径）
    pub fn short_name(&self) -> &'static str {
        let name = self.name.split('<').next().unwrap_or(self.name);
        name.rsplit("::").next().unwrap_or(name)
    }

    /// 判断是否为指定类型
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl Serialize for TypeKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name)
    }
}

/// 组件键
///
/// 在单个注册表内唯一。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ComponentKey {
    /// 以类型作为键
    Type(TypeKey),
    /// 以名称作为键
    Name(String),
    /// 自注册检测使用的临时探针键
    Probe(uuid::Uuid),
}

impl ComponentKey {
    /// 以类型创建组件键
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Type(TypeKey::of::<T>())
    }

    /// 以名称创建组件键
    pub fn named(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// 创建新的探针键
    pub fn probe() -> Self {
        Self::Probe(uuid::Uuid::new_v4())
    }

    /// 若为类型键则返回类型
    pub fn as_type(&self) -> Option<&TypeKey> {
        match self {
            Self::Type(ty) => Some(ty),
            _ => None,
        }
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(ty) => write!(f, "{}", ty),
            Self::Name(name) => f.write_str(name),
            Self::Probe(id) => write!(f, "probe:{}", id),
        }
    }
}

impl From<TypeKey> for ComponentKey {
    fn from(ty: TypeKey) -> Self {
        Self::Type(ty)
    }
}

impl From<&str> for ComponentKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for ComponentKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter {}
    struct English;

    #[test]
    fn test_type_key_equality_ignores_name() {
        assert_eq!(TypeKey::of::<English>(), TypeKey::of::<English>());
        assert_ne!(TypeKey::of::<English>(), TypeKey::of::<dyn Greeter>());
        assert!(TypeKey::of::<dyn Greeter>().is::<dyn Greeter>());
    }

    #[test]
    fn test_short_name() {
        assert_eq!(TypeKey::of::<English>().short_name(), "English");
        assert_eq!(TypeKey::of::<Vec<English>>().short_name(), "Vec");
    }

    #[test]
    fn test_component_key_display() {
        assert_eq!(ComponentKey::named("svc").to_string(), "svc");
        assert!(ComponentKey::probe().to_string().starts_with("probe:"));
        assert_eq!(ComponentKey::from("svc"), ComponentKey::named("svc"));
        assert_ne!(ComponentKey::probe(), ComponentKey::probe());
    }
}
