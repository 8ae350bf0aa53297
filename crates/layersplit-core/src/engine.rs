//! 几何数据访问层接口
//!
//! 扫描、选择导出与名称校验由外部几何引擎提供，本 crate 只依赖这一 trait。
//! 数据源与目标均以参数显式传入，引擎不持有"当前工作空间"之类的全局状态。

use crate::dataset::{DestinationRef, SubCollection};
use crate::error::{DestinationError, SourceReadError};
use crate::predicate::SelectionPredicate;

/// 属性列的惰性扫描结果，`None` 表示该记录的属性为空值
pub type AttributeScan<'a> = Box<dyn Iterator<Item = Result<Option<String>, SourceReadError>> + 'a>;

/// 外部几何引擎
pub trait GeometryEngine: Send + Sync {
    /// 逐条读取子集中所有记录的某个属性值。可重复调用，只读。
    fn scan_attribute<'a>(
        &'a self,
        source: &SubCollection,
        field: &str,
    ) -> Result<AttributeScan<'a>, SourceReadError>;

    /// 用谓词过滤子集，并把结果写入目标工作空间中的新数据集，返回写入的记录数
    fn select_and_export(
        &self,
        source: &SubCollection,
        destination: &DestinationRef,
        output_name: &str,
        predicate: &SelectionPredicate,
    ) -> Result<u64, DestinationError>;

    /// 把候选名规范为目标中合法且未被占用的名称
    fn validate_name(
        &self,
        candidate: &str,
        destination: &DestinationRef,
    ) -> Result<String, DestinationError>;
}
