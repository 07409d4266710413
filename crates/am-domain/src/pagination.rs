use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_num_item")]
    pub num_item: i64,
}

fn default_page() -> i64 {
    1
}

fn default_num_item() -> i64 {
    20
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: default_page(),
            num_item: default_num_item(),
        }
    }
}

impl PageRequest {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.num_item.max(1)
    }

    pub fn limit(&self) -> i64 {
        self.num_item.max(1)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub current_page: i64,
    pub num_item: i64,
    pub total_count: i64,
    pub total_page: i64,
    pub has_next_page: bool,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(request: PageRequest, total_count: i64, items: Vec<T>) -> Self {
        let num_item = request.num_item.max(1);
        let total_page = ((total_count as f64) / (num_item as f64)).ceil() as i64;
        let total_page = total_page.max(1);
        let current_page = request.page.max(1);
        Page {
            current_page,
            num_item,
            total_count,
            total_page,
            has_next_page: current_page < total_page,
            items,
        }
    }
}
