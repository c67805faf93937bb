//! NCX导航元素数据结构定义

/// 文档标题
#[derive(Debug, Clone)]
pub struct DocTitle {
    pub text: String,
}

/// 导航标签
#[derive(Debug, Clone, Default)]
pub struct NavLabel {
    pub text: String,
}

/// 导航内容引用
#[derive(Debug, Clone, Default)]
pub struct NavContent {
    /// 源文件路径（相对于NCX文件，可能带有#片段）
    pub src: String,
}

/// 导航点
#[derive(Debug, Clone)]
pub struct NavPoint {
    pub id: String,
    /// 播放顺序
    pub play_order: u32,
    pub nav_label: NavLabel,
    pub content: NavContent,
    /// 子导航点
    pub children: Vec<NavPoint>,
}

impl NavPoint {
    /// 创建新的导航点
    pub fn new(id: String, play_order: u32) -> Self {
        Self {
            id,
            play_order,
            nav_label: NavLabel::default(),
            content: NavContent::default(),
            children: Vec::new(),
        }
    }

    /// 按playOrder排序子导航点
    fn sort_children_by_play_order(&mut self) {
        self.children.sort_by_key(|child| child.play_order);
        for child in &mut self.children {
            child.sort_children_by_play_order();
        }
    }

    /// 先序遍历，返回自身及所有子导航点
    pub fn flatten(&self) -> Vec<&NavPoint> {
        let mut points = vec![self];
        for child in &self.children {
            points.extend(child.flatten());
        }
        points
    }
}

/// 导航地图
#[derive(Debug, Clone, Default)]
pub struct NavMap {
    pub nav_points: Vec<NavPoint>,
}

impl NavMap {
    /// 按playOrder排序所有导航点（包括子导航点）
    ///
    /// 排序是稳定的，playOrder缺失（为0）时保持文档顺序。
    pub fn sort_by_play_order(&mut self) {
        self.nav_points.sort_by_key(|point| point.play_order);
        for nav_point in &mut self.nav_points {
            nav_point.sort_children_by_play_order();
        }
    }

    /// 获取所有导航点的平铺列表（先序）
    pub fn flatten(&self) -> Vec<&NavPoint> {
        self.nav_points.iter().flat_map(|point| point.flatten()).collect()
    }
}
