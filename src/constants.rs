/// 列表接口默认分页大小
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// 列表接口最大分页大小
pub const MAX_PAGE_SIZE: u64 = 100;

/// 每个用户最多保留的登录会话数
pub const MAX_SESSIONS_PER_USER: usize = 10;

/// 单次上传的测量样本上限（约 30fps 下一小时）
pub const MAX_MEASUREMENT_SAMPLES: usize = 108_000;

/// 单帧关键点数量上限
pub const MAX_FRAME_LANDMARKS: usize = 64;
