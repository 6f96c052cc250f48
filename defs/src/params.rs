use crate::context::TemplateContext;
use crate::errors::ContextError;

pub const KEY_NAMESPACE: &str = "namespace";
pub const KEY_STORAGE_CLASS: &str = "storage_class";
pub const KEY_VERSION: &str = "version";
pub const KEY_NODE_IP: &str = "node_ip";

/// User-level inputs, validated before the plan starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    pub namespace: String,
    pub storage_class: String,
    pub version: String,
    pub node_address: String,
}

impl Parameters {
    /// Writes the parameters into `ctx` under the well-known keys.
    pub fn seed(&self, ctx: &mut TemplateContext) -> Result<(), ContextError> {
        ctx.insert(KEY_NAMESPACE, self.namespace.as_str())?;
        ctx.insert(KEY_STORAGE_CLASS, self.storage_class.as_str())?;
        ctx.insert(KEY_VERSION, self.version.as_str())?;
        ctx.insert(KEY_NODE_IP, self.node_address.as_str())?;
        Ok(())
    }
}
