// crates/pt_transport/src/lib.rs

//! PoroTrans 输运层
//!
//! 非结构（可分区）多面体网格上的对流-弥散溶质输运求解器：
//! 显式守恒有限体积对流 + 自适应子循环 + 二阶重构/限制器
//! + 隐式弥散/扩散求解 + 双重孔隙交换。
//!
//! # 模块概览
//!
//! - [`mesh`]: 网格拓扑/几何抽象及非结构网格实现
//! - [`comm`]: 跨进程规约与 ghost 同步抽象
//! - [`state`]: 按键存取的场存储
//! - [`upwind`]: 迎风拓扑（流形/非流形）
//! - [`timestep`]: CFL 稳定时间步估计
//! - [`subcycle`]: 子循环步长序列与饱和度插值
//! - [`advection`]: 对流格式（施主迎风、二阶 RK）
//! - [`sources`]: 源汇项累加
//! - [`boundary`]: 边界数据提供者
//! - [`dispersion`]: 隐式弥散/扩散求解
//! - [`multiscale`]: 双重孔隙（裂隙-基质）交换
//! - [`diagnostics`]: 质量平衡与极值检查
//! - [`pk`]: 对外驱动接口 [`TransportPk`]
//!
//! # 示例
//!
//! ```
//! use std::sync::Arc;
//! use pt_transport::prelude::*;
//!
//! let mesh = Arc::new(UnstructuredMesh::column_1d(10, 10.0, 1.0).unwrap());
//! let comm = Arc::new(SerialComm);
//! let config = TransportConfig::new(vec!["tracer".into()]);
//! let mut pk = TransportPk::new(config, mesh.clone(), comm.clone()).unwrap();
//!
//! let mut state = FieldStore::new(comm);
//! pk.setup(&mut state).unwrap();
//! state.fill_face_field(keys::DARCY_FLUX, 1.0).unwrap();
//! pk.initialize(&mut state).unwrap();
//!
//! let dt = pk.stable_time_step(&mut state).unwrap();
//! assert!((dt - 1.0).abs() < 1e-12);
//! ```

#![warn(clippy::all)]

pub mod advection;
pub mod boundary;
pub mod comm;
pub mod config;
pub mod diagnostics;
pub mod dispersion;
pub mod error;
pub mod mesh;
pub mod multiscale;
pub mod numerics;
pub mod pk;
pub mod sources;
pub mod state;
pub mod subcycle;
pub mod timestep;
pub mod upwind;

pub use comm::{Communicator, SerialComm};
pub use config::TransportConfig;
pub use error::{ConfigError, TransportError, TransportResult};
pub use mesh::{Ownership, TransportMesh, UnstructuredMesh};
pub use pk::TransportPk;
pub use state::{keys, FieldStore, MultiField};
pub use timestep::LARGE_TIME_STEP;
pub use upwind::{TopologyKind, UpwindTopology};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::boundary::{BoundaryFunction, FunctionBoundary};
    pub use crate::comm::{Communicator, SerialComm};
    pub use crate::config::{
        DispersionConfig, MultiscaleModel, TransportConfig, Verbosity,
    };
    pub use crate::error::{ConfigError, TransportError, TransportResult};
    pub use crate::mesh::{MeshBuilder, Ownership, TransportMesh, UnstructuredMesh};
    pub use crate::pk::TransportPk;
    pub use crate::sources::{FunctionSource, SourceKind, SourceSpec};
    pub use crate::state::{keys, FaceDofMap, FaceFlux, FieldStore, MultiField};
    pub use crate::timestep::LARGE_TIME_STEP;
    pub use crate::upwind::{TopologyKind, UpwindTopology};
}
